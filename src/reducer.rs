//! Form state and the state-transition function.
//!
//! [`Reducer::reduce`] is pure: it reads the current state, never modifies
//! it, and returns the next one. Field-tree edits share every untouched
//! subtree with the previous state. It never panics on bad input; rejected
//! paths are logged and leave the state as it was.
//!
//! Source-specific behaviour is layered on top through [`SourceReducer`]. A
//! source reducer sees each action first and answers with an explicit
//! [`Outcome`]; only `Outcome::Unhandled` lets the base transitions run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LoadError, PathError};
use crate::path::{canonicalize, FieldPath};
use crate::projector::project;
use crate::reconciler::{reconcile, visible_errors, Reconciliation, Visibility};
use crate::types::{FieldTree, SelectOption};
use crate::validator::{canonical_errors, ErrorMap, ValidationResult, ValidationSchema};

/// Everything the form knows at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub fields: FieldTree,
    /// Errors currently shown, by canonical path.
    pub errors: ErrorMap,
    /// Every error from the last validation, shown or not.
    pub full_errors: ErrorMap,
    pub is_valid: bool,
    pub is_submitting: bool,
    pub is_submitted: bool,
    /// Canonical paths of fields edited or blurred at least once.
    pub touched_fields: BTreeSet<String>,
    pub validate_all: bool,
    /// Latest option-load generation per canonical path.
    #[serde(skip)]
    load_generations: BTreeMap<String, u64>,
}

impl FormState {
    pub fn new(fields: FieldTree) -> Self {
        Self {
            fields,
            errors: ErrorMap::new(),
            full_errors: ErrorMap::new(),
            is_valid: false,
            is_submitting: false,
            is_submitted: false,
            touched_fields: BTreeSet::new(),
            validate_all: false,
            load_generations: BTreeMap::new(),
        }
    }

    pub fn is_touched(&self, path: &str) -> bool {
        self.touched_fields.contains(&canonicalize(path))
    }

    /// Current option-load generation of `path` (0 before any load began).
    pub fn load_generation(&self, path: &str) -> u64 {
        self.load_generations
            .get(&canonicalize(path))
            .copied()
            .unwrap_or(0)
    }

    fn reconciliation(&self) -> Reconciliation {
        Reconciliation {
            errors: self.errors.clone(),
            full_errors: self.full_errors.clone(),
            is_valid: self.is_valid,
        }
    }

    fn with_reconciliation(mut self, result: Reconciliation) -> Self {
        self.errors = result.errors;
        self.full_errors = result.full_errors;
        self.is_valid = result.is_valid;
        self
    }

    fn visibility(&self) -> Visibility<'_> {
        Visibility {
            touched: &self.touched_fields,
            validate_all: self.validate_all,
        }
    }

    /// Whether a ticketed option-load action is older than the newest load.
    fn is_stale(&self, key: &str, generation: Option<u64>) -> bool {
        match generation {
            Some(generation) => generation != self.load_generations.get(key).copied().unwrap_or(0),
            None => false,
        }
    }
}

/// A discrete state transition request.
#[derive(Debug, Clone)]
pub enum Action {
    /// Set a field value, mark it touched, and re-validate.
    UpdateFieldValue {
        field: String,
        value: Value,
        schema: Option<ValidationSchema>,
    },
    /// Set a loading flag. With a `generation`, ignored unless it matches the
    /// field's newest load.
    SetFieldLoading {
        field: String,
        is_loading: bool,
        generation: Option<u64>,
    },
    /// Replace an option list. With a `generation`, ignored unless it matches
    /// the field's newest load.
    UpdateFieldOptions {
        field: String,
        options: Vec<SelectOption>,
        generation: Option<u64>,
    },
    /// Start a new option load: bump the field's generation and set loading.
    BeginFieldLoad { field: String },
    /// Mark a field touched and re-validate it with its current value.
    ValidateFieldOnBlur {
        field: String,
        schema: Option<ValidationSchema>,
    },
    /// Mark a field touched without re-validating.
    MarkFieldAsTouched { field: String },
    SetValidateAll(bool),
    /// Overwrite validity and errors with an externally computed result.
    SetValidationResult(ValidationResult),
    SetSubmitting(bool),
    SetSubmitted(bool),
    /// Return to a fresh copy of the initial state.
    ResetForm,
    /// An action only a source reducer understands.
    Source { name: String, payload: Value },
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::UpdateFieldValue { .. } => "UPDATE_FIELD_VALUE",
            Action::SetFieldLoading { .. } => "SET_FIELD_LOADING",
            Action::UpdateFieldOptions { .. } => "UPDATE_FIELD_OPTIONS",
            Action::BeginFieldLoad { .. } => "BEGIN_FIELD_LOAD",
            Action::ValidateFieldOnBlur { .. } => "VALIDATE_FIELD_ON_BLUR",
            Action::MarkFieldAsTouched { .. } => "MARK_FIELD_AS_TOUCHED",
            Action::SetValidateAll(_) => "SET_VALIDATE_ALL",
            Action::SetValidationResult(_) => "SET_VALIDATION_RESULT",
            Action::SetSubmitting(_) => "SET_SUBMITTING",
            Action::SetSubmitted(_) => "SET_SUBMITTED",
            Action::ResetForm => "RESET_FORM",
            Action::Source { name, .. } => name.as_str(),
        }
    }
}

/// JSON form of the built-in actions, e.g.
/// `{"type": "UPDATE_FIELD_VALUE", "field": "projectName", "value": "Foo"}`.
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireAction {
    UpdateFieldValue {
        field: String,
        #[serde(default)]
        value: Value,
    },
    #[serde(rename_all = "camelCase")]
    SetFieldLoading { field: String, is_loading: bool },
    UpdateFieldOptions {
        #[serde(alias = "fieldName")]
        field: String,
        options: Vec<SelectOption>,
    },
    BeginFieldLoad { field: String },
    ValidateFieldOnBlur { field: String },
    MarkFieldAsTouched { field: String },
    SetValidateAll { payload: bool },
    SetValidationResult { payload: ValidationResult },
    SetSubmitting { payload: bool },
    SetSubmitted { payload: bool },
    ResetForm,
}

const BUILT_IN_ACTIONS: &[&str] = &[
    "UPDATE_FIELD_VALUE",
    "SET_FIELD_LOADING",
    "UPDATE_FIELD_OPTIONS",
    "BEGIN_FIELD_LOAD",
    "VALIDATE_FIELD_ON_BLUR",
    "MARK_FIELD_AS_TOUCHED",
    "SET_VALIDATE_ALL",
    "SET_VALIDATION_RESULT",
    "SET_SUBMITTING",
    "SET_SUBMITTED",
    "RESET_FORM",
];

impl Action {
    /// Decode an action from its JSON form. Validating actions use `schema`.
    /// Unknown `type`s become [`Action::Source`] carrying the whole object.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidAction` when `type` is missing or a
    /// built-in action lacks its fields.
    pub fn from_json(value: Value, schema: Option<&ValidationSchema>) -> Result<Self, LoadError> {
        let Some(kind) = value.get("type").and_then(Value::as_str) else {
            return Err(LoadError::InvalidAction {
                message: format!("missing \"type\" in {}", value),
            });
        };
        if !BUILT_IN_ACTIONS.contains(&kind) {
            return Ok(Action::Source {
                name: kind.to_string(),
                payload: value,
            });
        }

        let wire: WireAction =
            serde_json::from_value(value).map_err(|e| LoadError::InvalidAction {
                message: e.to_string(),
            })?;
        let schema = schema.cloned();
        Ok(match wire {
            WireAction::UpdateFieldValue { field, value } => Action::UpdateFieldValue {
                field,
                value,
                schema,
            },
            WireAction::SetFieldLoading { field, is_loading } => Action::SetFieldLoading {
                field,
                is_loading,
                generation: None,
            },
            WireAction::UpdateFieldOptions { field, options } => Action::UpdateFieldOptions {
                field,
                options,
                generation: None,
            },
            WireAction::BeginFieldLoad { field } => Action::BeginFieldLoad { field },
            WireAction::ValidateFieldOnBlur { field } => Action::ValidateFieldOnBlur { field, schema },
            WireAction::MarkFieldAsTouched { field } => Action::MarkFieldAsTouched { field },
            WireAction::SetValidateAll { payload } => Action::SetValidateAll(payload),
            WireAction::SetValidationResult { payload } => Action::SetValidationResult(payload),
            WireAction::SetSubmitting { payload } => Action::SetSubmitting(payload),
            WireAction::SetSubmitted { payload } => Action::SetSubmitted(payload),
            WireAction::ResetForm => Action::ResetForm,
        })
    }
}

/// Answer of a source reducer.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The source handled the action; this is the next state.
    Handled(FormState),
    /// The source does not know the action; base transitions apply.
    Unhandled,
}

/// Source-specific transitions layered over the base reducer.
pub trait SourceReducer: Send + Sync {
    fn reduce(&self, state: &FormState, action: &Action) -> Outcome;
}

/// The layered reducer: optional source layer, then base transitions.
#[derive(Clone)]
pub struct Reducer {
    initial: Arc<FormState>,
    source: Option<Arc<dyn SourceReducer>>,
}

impl std::fmt::Debug for Reducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reducer")
            .field("initial", &self.initial)
            .field("source", &self.source.is_some())
            .finish()
    }
}

impl Reducer {
    /// Reducer whose `ResetForm` returns to a copy of `initial`.
    pub fn new(initial: FormState) -> Self {
        Self {
            initial: Arc::new(initial),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Arc<dyn SourceReducer>) -> Self {
        self.source = Some(source);
        self
    }

    /// The snapshot `ResetForm` restores. Never handed out for mutation.
    pub fn initial(&self) -> &FormState {
        &self.initial
    }

    /// A fresh state equal to the initial snapshot but sharing none of its
    /// field tree.
    pub fn initial_state(&self) -> FormState {
        FormState {
            fields: self.initial.fields.detached(),
            ..FormState::clone(&self.initial)
        }
    }

    pub fn reduce(&self, state: &FormState, action: &Action) -> FormState {
        log::debug!("dispatch {}", action.name());
        if let Some(source) = &self.source {
            if let Outcome::Handled(next) = source.reduce(state, action) {
                return next;
            }
        }
        self.reduce_base(state, action)
    }

    /// Base transitions only. Unknown actions return an equal state that
    /// shares the field tree.
    pub fn reduce_base(&self, state: &FormState, action: &Action) -> FormState {
        match action {
            Action::UpdateFieldValue {
                field,
                value,
                schema,
            } => update_field_value(state, field, value, schema.as_ref()),

            Action::SetFieldLoading {
                field,
                is_loading,
                generation,
            } => with_path(field, |path, key| {
                if state.is_stale(key, *generation) {
                    log::warn!("ignoring stale loading flag for '{}'", key);
                    return None;
                }
                state.fields.set_loading(path, *is_loading).ok_or_warn(key)
            })
            .map(|fields| FormState {
                fields,
                ..state.clone()
            })
            .unwrap_or_else(|| state.clone()),

            Action::UpdateFieldOptions {
                field,
                options,
                generation,
            } => with_path(field, |path, key| {
                if state.is_stale(key, *generation) {
                    log::warn!("ignoring stale options for '{}'", key);
                    return None;
                }
                state.fields.set_options(path, options.clone()).ok_or_warn(key)
            })
            .map(|fields| FormState {
                fields,
                ..state.clone()
            })
            .unwrap_or_else(|| state.clone()),

            Action::BeginFieldLoad { field } => {
                let mut next = state.clone();
                let updated = with_path(field, |path, key| {
                    let fields = state.fields.set_loading(path, true).ok_or_warn(key)?;
                    Some((fields, key.to_string()))
                });
                if let Some((fields, key)) = updated {
                    next.fields = fields;
                    *next.load_generations.entry(key).or_insert(0) += 1;
                }
                next
            }

            Action::ValidateFieldOnBlur { field, schema } => {
                let Some(path) = parse_or_warn(field) else {
                    return state.clone();
                };
                let mut next = state.clone();
                next.touched_fields.insert(path.to_string());
                let current = next.fields.get_value(&path);
                let result = reconcile(
                    project(&next.fields),
                    &path,
                    current.as_ref(),
                    schema.as_ref(),
                    next.visibility(),
                    &next.reconciliation(),
                );
                next.with_reconciliation(result)
            }

            Action::MarkFieldAsTouched { field } => {
                let mut next = state.clone();
                next.touched_fields.insert(canonicalize(field));
                next.errors = visible_errors(&next.full_errors, next.visibility());
                next
            }

            Action::SetValidateAll(validate_all) => {
                let mut next = state.clone();
                next.validate_all = *validate_all;
                next.errors = visible_errors(&next.full_errors, next.visibility());
                next
            }

            Action::SetValidationResult(result) => {
                let errors = canonical_errors(&result.errors);
                FormState {
                    is_valid: result.is_valid,
                    full_errors: errors.clone(),
                    errors,
                    ..state.clone()
                }
            }

            Action::SetSubmitting(flag) => FormState {
                is_submitting: *flag,
                ..state.clone()
            },

            Action::SetSubmitted(flag) => FormState {
                is_submitted: *flag,
                ..state.clone()
            },

            // Load generations survive a reset so tickets issued before it
            // stay stale.
            Action::ResetForm => {
                let mut next = self.initial_state();
                next.load_generations = state.load_generations.clone();
                next
            }

            Action::Source { name, .. } => {
                log::debug!("no handler for source action {}", name);
                state.clone()
            }
        }
    }
}

fn update_field_value(
    state: &FormState,
    field: &str,
    value: &Value,
    schema: Option<&ValidationSchema>,
) -> FormState {
    let Some(path) = parse_or_warn(field) else {
        return state.clone();
    };
    let key = path.to_string();
    let Some(fields) = state.fields.set_value(&path, value.clone()).ok_or_warn(&key) else {
        return state.clone();
    };

    let mut next = FormState {
        fields,
        ..state.clone()
    };
    next.touched_fields.insert(key);
    let result = reconcile(
        project(&next.fields),
        &path,
        Some(value),
        schema,
        next.visibility(),
        &next.reconciliation(),
    );
    next.with_reconciliation(result)
}

fn parse_or_warn(field: &str) -> Option<FieldPath> {
    match FieldPath::parse(field) {
        Ok(path) => Some(path),
        Err(e) => {
            log::warn!("ignoring action on invalid path: {}", e);
            None
        }
    }
}

fn with_path<T>(field: &str, f: impl FnOnce(&FieldPath, &str) -> Option<T>) -> Option<T> {
    let path = parse_or_warn(field)?;
    let key = path.to_string();
    f(&path, &key)
}

trait OkOrWarn<T> {
    fn ok_or_warn(self, key: &str) -> Option<T>;
}

impl<T> OkOrWarn<T> for Result<T, PathError> {
    fn ok_or_warn(self, key: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("rejected write to '{}': {}", key, e);
                None
            }
        }
    }
}
