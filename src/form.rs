//! A form session: current state, its reducer, and the schema it validates
//! against.
//!
//! This is the surface field widgets talk to. Every method dispatches one or
//! more [`Action`]s through the layered [`Reducer`]; nothing here edits the
//! state directly.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{OptionsError, PathError};
use crate::options::{LoadTicket, OptionsSource};
use crate::path::FieldPath;
use crate::projector::project;
use crate::reducer::{Action, FormState, Reducer, SourceReducer};
use crate::types::{FieldTree, SelectOption};
use crate::validator::{validate_project, ValidationResult, ValidationSchema};

#[derive(Debug, Clone)]
pub struct Form {
    reducer: Reducer,
    state: FormState,
    schema: Option<ValidationSchema>,
}

impl Form {
    pub fn new(fields: FieldTree) -> Self {
        let reducer = Reducer::new(FormState::new(fields));
        let state = reducer.initial_state();
        Self {
            reducer,
            state,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: ValidationSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_source_reducer(mut self, source: Arc<dyn SourceReducer>) -> Self {
        self.reducer = self.reducer.with_source(source);
        self
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    pub fn schema(&self) -> Option<&ValidationSchema> {
        self.schema.as_ref()
    }

    /// Apply `action` and return the new state.
    pub fn dispatch(&mut self, action: Action) -> &FormState {
        self.state = self.reducer.reduce(&self.state, &action);
        &self.state
    }

    /// Current validation data.
    pub fn project(&self) -> Value {
        project(&self.state.fields)
    }

    pub fn update_field(&mut self, path: &str, value: Value) {
        let schema = self.schema.clone();
        self.dispatch(Action::UpdateFieldValue {
            field: path.to_string(),
            value,
            schema,
        });
    }

    pub fn validate_field_on_blur(&mut self, path: &str) {
        let schema = self.schema.clone();
        self.dispatch(Action::ValidateFieldOnBlur {
            field: path.to_string(),
            schema,
        });
    }

    pub fn set_field_loading(&mut self, path: &str, is_loading: bool) {
        self.dispatch(Action::SetFieldLoading {
            field: path.to_string(),
            is_loading,
            generation: None,
        });
    }

    pub fn update_field_options(&mut self, path: &str, options: Vec<SelectOption>) {
        self.dispatch(Action::UpdateFieldOptions {
            field: path.to_string(),
            options,
            generation: None,
        });
    }

    pub fn reset_form(&mut self) {
        self.dispatch(Action::ResetForm);
    }

    pub fn mark_touched(&mut self, path: &str) {
        self.dispatch(Action::MarkFieldAsTouched {
            field: path.to_string(),
        });
    }

    pub fn set_validate_all(&mut self, validate_all: bool) {
        self.dispatch(Action::SetValidateAll(validate_all));
    }

    pub fn set_validation_result(&mut self, result: ValidationResult) {
        self.dispatch(Action::SetValidationResult(result));
    }

    pub fn set_submitting(&mut self, submitting: bool) {
        self.dispatch(Action::SetSubmitting(submitting));
    }

    pub fn set_submitted(&mut self, submitted: bool) {
        self.dispatch(Action::SetSubmitted(submitted));
    }

    /// Mark `path` as loading and start a new load generation for it.
    ///
    /// Returns `None` when `path` does not name a field.
    pub fn begin_options_load(&mut self, path: &str) -> Option<LoadTicket> {
        let key = FieldPath::parse(path).ok()?.to_string();
        let before = self.state.load_generation(&key);
        self.dispatch(Action::BeginFieldLoad { field: key.clone() });
        let generation = self.state.load_generation(&key);
        (generation > before).then(|| LoadTicket::new(key, generation))
    }

    /// Deliver the result of a load and clear the loading flag.
    ///
    /// Both steps are skipped if a newer load for the same field has begun.
    /// The loading flag is cleared on failure too.
    ///
    /// # Errors
    ///
    /// Returns the load's own error after cleaning up.
    pub fn finish_options_load(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<SelectOption>, OptionsError>,
    ) -> Result<(), OptionsError> {
        let outcome = match result {
            Ok(options) => {
                self.dispatch(Action::UpdateFieldOptions {
                    field: ticket.field().to_string(),
                    options,
                    generation: Some(ticket.generation()),
                });
                Ok(())
            }
            Err(e) => {
                log::warn!("loading options for '{}' failed: {}", ticket.field(), e);
                Err(e)
            }
        };
        self.dispatch(Action::SetFieldLoading {
            field: ticket.field().to_string(),
            is_loading: false,
            generation: Some(ticket.generation()),
        });
        outcome
    }

    /// Fetch and apply the options of one field.
    ///
    /// # Errors
    ///
    /// Returns `OptionsError` if `path` names no field or `source` fails. The
    /// loading flag is never left set.
    pub fn load_options(
        &mut self,
        path: &str,
        source: &dyn OptionsSource,
    ) -> Result<(), OptionsError> {
        let ticket = self
            .begin_options_load(path)
            .ok_or_else(|| OptionsError::Unavailable {
                field: path.to_string(),
            })?;
        let result = source.fetch(ticket.field());
        self.finish_options_load(&ticket, result)
    }

    /// Mark every path loading, then fetch each in turn. Returns the failures.
    pub fn load_all_options<'a, I>(&mut self, paths: I, source: &dyn OptionsSource) -> Vec<OptionsError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut failures = Vec::new();
        let mut tickets = Vec::new();
        for path in paths {
            match self.begin_options_load(path) {
                Some(ticket) => tickets.push(ticket),
                None => failures.push(OptionsError::Unavailable {
                    field: path.to_string(),
                }),
            }
        }
        for ticket in tickets {
            let result = source.fetch(ticket.field());
            if let Err(e) = self.finish_options_load(&ticket, result) {
                failures.push(e);
            }
        }
        failures
    }

    /// Append an item with every template child set to `""`.
    ///
    /// # Errors
    ///
    /// Returns `PathError` if `path` is not an array field.
    pub fn add_array_item(&mut self, path: &str) -> Result<(), PathError> {
        let (path, mut items) = self.array_items(path)?;
        let item = self
            .state
            .fields
            .node_at(&path)
            .and_then(|node| node.empty_item())
            .ok_or_else(|| no_items(&path))?;
        items.push(Value::Object(item));
        self.update_field(&path.to_string(), Value::Array(items));
        Ok(())
    }

    /// Remove the item at `index`.
    ///
    /// # Errors
    ///
    /// Returns `PathError` if `path` is not an array field or `index` is out
    /// of bounds.
    pub fn remove_array_item(&mut self, path: &str, index: usize) -> Result<(), PathError> {
        let (path, mut items) = self.array_items(path)?;
        if index >= items.len() {
            return Err(PathError::IndexOutOfBounds {
                path: path.to_string(),
                field: path.parts().pop().unwrap_or_default(),
                index,
                len: items.len(),
            });
        }
        items.remove(index);
        self.update_field(&path.to_string(), Value::Array(items));
        Ok(())
    }

    fn array_items(&self, path: &str) -> Result<(FieldPath, Vec<Value>), PathError> {
        let path = FieldPath::parse(path)?;
        let node = self
            .state
            .fields
            .node_at(&path)
            .filter(|node| node.empty_item().is_some())
            .ok_or_else(|| no_items(&path))?;
        match node.value() {
            Some(Value::Array(items)) => Ok((path, items)),
            _ => Err(no_items(&path)),
        }
    }

    /// Validate the whole form and reveal every error.
    ///
    /// Sets `validateAll`, runs the schema over the full projection, stores
    /// the result, and marks the form submitted only when it is valid. With
    /// no schema the form is considered valid.
    pub fn submit(&mut self) -> ValidationResult {
        self.set_validate_all(true);
        self.set_submitting(true);

        let result = match &self.schema {
            Some(schema) => validate_project(&self.project(), schema),
            None => ValidationResult::valid(),
        };
        log::debug!(
            "submit: valid={} errors={}",
            result.is_valid,
            result.errors.len()
        );

        self.set_validation_result(result.clone());
        self.set_submitting(false);
        if result.is_valid {
            self.set_submitted(true);
        }
        result
    }
}

fn no_items(path: &FieldPath) -> PathError {
    PathError::NoProperty {
        path: path.to_string(),
        property: "items",
    }
}
