//! Schema contract and full-project validation.
//!
//! Any type implementing [`Validate`] can serve as a form schema. A
//! [`ValidationSchema`] holds either a ready instance or a zero-argument
//! factory that builds one per validation run, for schemas that depend on
//! data loaded at runtime (e.g. option sets fetched from a service).

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FieldError, ValidateError};
use crate::path::canonicalize;

/// Error map key for failures that belong to no single field.
pub const GENERAL_ERROR_KEY: &str = "_general";

/// Message stored under [`GENERAL_ERROR_KEY`] when the schema itself fails.
pub const GENERAL_ERROR_MESSAGE: &str = "Validation error occurred";

/// Canonical field path to message.
pub type ErrorMap = BTreeMap<String, String>;

/// A schema that checks the projected form data.
pub trait Validate: Send + Sync {
    /// Report every violation in `data`, not just the first.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError` when the schema cannot be evaluated at all.
    fn validate(&self, data: &Value) -> Result<Vec<FieldError>, ValidateError>;
}

/// Adapts a closure into a [`Validate`] implementation.
pub struct FnValidator<F>(pub F);

impl<F> Validate for FnValidator<F>
where
    F: Fn(&Value) -> Vec<FieldError> + Send + Sync,
{
    fn validate(&self, data: &Value) -> Result<Vec<FieldError>, ValidateError> {
        Ok((self.0)(data))
    }
}

type SchemaFactory = dyn Fn() -> Result<Arc<dyn Validate>, ValidateError> + Send + Sync;

/// A schema instance or a factory producing one.
#[derive(Clone)]
pub enum ValidationSchema {
    Instance(Arc<dyn Validate>),
    Factory(Arc<SchemaFactory>),
}

impl ValidationSchema {
    pub fn new(schema: impl Validate + 'static) -> Self {
        ValidationSchema::Instance(Arc::new(schema))
    }

    /// Schema backed by a plain function over the data.
    pub fn from_fn<F>(rules: F) -> Self
    where
        F: Fn(&Value) -> Vec<FieldError> + Send + Sync + 'static,
    {
        Self::new(FnValidator(rules))
    }

    /// Schema rebuilt by `factory` on every validation run.
    pub fn factory<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Validate>, ValidateError> + Send + Sync + 'static,
    {
        ValidationSchema::Factory(Arc::new(factory))
    }

    /// The concrete schema, calling the factory if there is one.
    pub fn resolve(&self) -> Result<Arc<dyn Validate>, ValidateError> {
        match self {
            ValidationSchema::Instance(schema) => Ok(Arc::clone(schema)),
            ValidationSchema::Factory(factory) => factory(),
        }
    }

    /// Resolve and validate, converting a panic inside the schema into
    /// `ValidateError::Engine`.
    pub fn check(&self, data: &Value) -> Result<Vec<FieldError>, ValidateError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.resolve()?.validate(data)))
            .unwrap_or_else(|payload| {
                Err(ValidateError::Engine {
                    message: panic_message(payload.as_ref()),
                })
            })
    }
}

impl fmt::Debug for ValidationSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationSchema::Instance(_) => f.write_str("ValidationSchema::Instance"),
            ValidationSchema::Factory(_) => f.write_str("ValidationSchema::Factory"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "schema panicked".to_string()
    }
}

/// JSON Schema adapter over the `jsonschema` crate.
///
/// Error paths come from each error's instance location. `required` errors
/// are reported by `jsonschema` at the parent object; they are re-keyed to the
/// missing property so they line up with the field that must be filled in.
pub struct JsonSchema {
    validator: jsonschema::Validator,
    messages: ErrorMap,
}

impl JsonSchema {
    /// Compile a JSON Schema document.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidSchema` if the document is not a valid schema.
    pub fn new(schema: &Value) -> Result<Self, ValidateError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
                message: e.to_string(),
            })?;
        Ok(Self {
            validator,
            messages: ErrorMap::new(),
        })
    }

    /// Replace the engine's message for every error at `path`. A `*`
    /// segment matches any item index (`categoryGroups.*.cpc`).
    pub fn with_message(mut self, path: &str, message: impl Into<String>) -> Self {
        let key = if path.contains('*') {
            path.to_string()
        } else {
            canonicalize(path)
        };
        self.messages.insert(key, message.into());
        self
    }

    /// Add several message overrides at once.
    pub fn with_messages<I, P, M>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = (P, M)>,
        P: AsRef<str>,
        M: Into<String>,
    {
        for (path, message) in messages {
            self = self.with_message(path.as_ref(), message);
        }
        self
    }
}

impl JsonSchema {
    /// Override for `path`: an exact match first, then the same path with
    /// every item index written as `*`.
    fn message_for(&self, path: &[String]) -> Option<&String> {
        let exact = canonicalize(&path.join("."));
        self.messages.get(&exact).or_else(|| {
            let wildcard = exact
                .split('.')
                .map(|part| {
                    if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                        "*"
                    } else {
                        part
                    }
                })
                .collect::<Vec<_>>()
                .join(".");
            self.messages.get(&wildcard)
        })
    }
}

impl fmt::Debug for JsonSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSchema")
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl Validate for JsonSchema {
    fn validate(&self, data: &Value) -> Result<Vec<FieldError>, ValidateError> {
        let errors = self
            .validator
            .iter_errors(data)
            .map(|e| {
                let mut path = pointer_segments(&e.instance_path.to_string());
                if let ValidationErrorKind::Required { property } = &e.kind {
                    if let Some(name) = property.as_str() {
                        path.push(name.to_string());
                    }
                }
                let message = self
                    .message_for(&path)
                    .cloned()
                    .unwrap_or_else(|| e.to_string());
                FieldError { path, message }
            })
            .collect();
        Ok(errors)
    }
}

fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|part| part.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Outcome of validating a whole form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: ErrorMap,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: ErrorMap::new(),
        }
    }

    /// A failed result carrying only the general error entry.
    pub fn general_failure() -> Self {
        let mut errors = ErrorMap::new();
        errors.insert(
            GENERAL_ERROR_KEY.to_string(),
            GENERAL_ERROR_MESSAGE.to_string(),
        );
        Self {
            is_valid: false,
            errors,
        }
    }
}

/// Key each reported error by its canonical path. The first message for a
/// path wins.
pub fn collect_errors(errors: Vec<FieldError>) -> ErrorMap {
    let mut map = ErrorMap::new();
    for error in errors {
        map.entry(error_key(&error.joined_path()))
            .or_insert(error.message);
    }
    map
}

/// Re-key an error map computed elsewhere by canonical path. When two keys
/// name the same field, the first in key order wins.
pub fn canonical_errors(errors: &ErrorMap) -> ErrorMap {
    let mut map = ErrorMap::new();
    for (path, message) in errors {
        map.entry(error_key(path)).or_insert_with(|| message.clone());
    }
    map
}

fn error_key(path: &str) -> String {
    let key = canonicalize(path);
    if key.is_empty() {
        GENERAL_ERROR_KEY.to_string()
    } else {
        key
    }
}

/// Validate already-projected data with no visibility filtering.
///
/// Used at submit time, when every error matters regardless of which fields
/// the user has touched. Never fails: engine errors become the general error.
pub fn validate_project(data: &Value, schema: &ValidationSchema) -> ValidationResult {
    match schema.check(data) {
        Ok(errors) => {
            let errors = collect_errors(errors);
            ValidationResult {
                is_valid: errors.is_empty(),
                errors,
            }
        }
        Err(e) => {
            log::error!("project validation failed: {}", e);
            ValidationResult::general_failure()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn groups_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "projectName": { "type": "string", "minLength": 1 },
                "categoryGroups": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "name": { "type": "string", "minLength": 1 },
                            "cpc": { "type": "number" }
                        },
                        "required": ["name", "cpc"]
                    }
                }
            },
            "required": ["projectName"]
        })
    }

    #[test]
    fn required_errors_are_keyed_by_missing_property() {
        let schema = JsonSchema::new(&groups_schema()).unwrap();
        let errors = schema.validate(&json!({})).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, ["projectName"]);
    }

    #[test]
    fn array_item_errors_use_index_segments() {
        let schema = JsonSchema::new(&groups_schema()).unwrap();
        let data = json!({
            "projectName": "Foo",
            "categoryGroups": [{ "name": "Shoes", "cpc": "" }]
        });
        let errors = collect_errors(schema.validate(&data).unwrap());
        assert_eq!(errors.keys().collect::<Vec<_>>(), ["categoryGroups.0.cpc"]);
    }

    #[test]
    fn message_overrides_apply_by_path() {
        let schema = JsonSchema::new(&groups_schema())
            .unwrap()
            .with_messages([
                ("projectName", "Project name is required"),
                ("categoryGroups[0].cpc", "Max CPC must be a number"),
            ]);
        let data = json!({ "categoryGroups": [{ "name": "Shoes", "cpc": "x" }] });
        let errors = collect_errors(schema.validate(&data).unwrap());
        assert_eq!(errors["projectName"], "Project name is required");
        assert_eq!(errors["categoryGroups.0.cpc"], "Max CPC must be a number");
    }

    #[test]
    fn wildcard_overrides_match_any_item() {
        let schema = JsonSchema::new(&groups_schema())
            .unwrap()
            .with_message("categoryGroups.*.name", "Group name is required");
        let data = json!({
            "projectName": "Foo",
            "categoryGroups": [{ "name": "A", "cpc": 1 }, { "name": "", "cpc": 1 }]
        });
        let errors = collect_errors(schema.validate(&data).unwrap());
        assert_eq!(errors["categoryGroups.1.name"], "Group name is required");
    }

    #[test]
    fn invalid_schema_document_is_rejected() {
        let err = JsonSchema::new(&json!({ "type": 12 })).unwrap_err();
        assert!(matches!(err, ValidateError::InvalidSchema { .. }));
    }

    #[test]
    fn factory_runs_on_every_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let schema = ValidationSchema::factory(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(JsonSchema::new(&groups_schema())?) as Arc<dyn Validate>)
        });

        schema.check(&json!({})).unwrap();
        schema.check(&json!({})).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_schema_becomes_engine_error() {
        let schema = ValidationSchema::from_fn(|_| panic!("boom"));
        let err = schema.check(&json!({})).unwrap_err();
        assert_eq!(
            err,
            ValidateError::Engine {
                message: "boom".into()
            }
        );
    }

    #[test]
    fn validate_project_reports_everything() {
        let schema = ValidationSchema::new(JsonSchema::new(&groups_schema()).unwrap());
        let result = validate_project(
            &json!({ "categoryGroups": [{ "name": "", "cpc": 1 }] }),
            &schema,
        );
        assert!(!result.is_valid);
        assert!(result.errors.contains_key("projectName"));
        assert!(result.errors.contains_key("categoryGroups.0.name"));
    }

    #[test]
    fn validate_project_failure_is_general_error() {
        let schema = ValidationSchema::factory(|| {
            Err(ValidateError::InvalidSchema {
                message: "missing".into(),
            })
        });
        let result = validate_project(&json!({}), &schema);
        assert_eq!(result, ValidationResult::general_failure());
    }

    #[test]
    fn collect_errors_keeps_first_message_and_normalizes() {
        let errors = collect_errors(vec![
            FieldError::new(["items[0]", "name"], "first"),
            FieldError::new(["items", "0", "name"], "second"),
            FieldError::new(Vec::<String>::new(), "whole form"),
        ]);
        assert_eq!(errors["items.0.name"], "first");
        assert_eq!(errors[GENERAL_ERROR_KEY], "whole form");
    }
}
