//! Form Engine
//!
//! State management for schema-driven forms: a persistent, path-addressed
//! field tree, a pure reducer over form actions, and validation that decides
//! which errors a user gets to see.
//!
//! The field tree is described once, as JSON, and every edit produces a new
//! tree that shares all untouched branches with the old one. Validation runs
//! against a *projection* of the tree (plain data with numbers parsed and
//! undefined values dropped), and errors stay hidden until the field they
//! belong to has been touched or the whole form is submitted.
//!
//! # Example
//!
//! ```
//! use form_engine::{FieldTree, Form, JsonSchema, ValidationSchema};
//! use serde_json::json;
//!
//! let fields = FieldTree::from_json(json!({
//!     "projectName": { "label": "Project Name", "type": "text", "value": "" },
//!     "dailyBudget": { "label": "Daily Budget", "type": "number", "value": "" }
//! }))
//! .unwrap();
//!
//! let schema = JsonSchema::new(&json!({
//!     "type": "object",
//!     "properties": { "projectName": { "type": "string", "minLength": 1 } },
//!     "required": ["projectName"]
//! }))
//! .unwrap()
//! .with_message("projectName", "Project name is required");
//!
//! let mut form = Form::new(fields).with_schema(ValidationSchema::new(schema));
//!
//! form.validate_field_on_blur("projectName");
//! assert_eq!(form.state().errors["projectName"], "Project name is required");
//!
//! form.update_field("projectName", json!("Foo"));
//! form.update_field("dailyBudget", json!("25"));
//! assert!(form.state().is_valid);
//! assert_eq!(form.project(), json!({ "projectName": "Foo", "dailyBudget": 25 }));
//! ```
//!
//! # Paths
//!
//! | Form | Example | Meaning |
//! |------|---------|---------|
//! | field path | `targeting.countries` | group child |
//! | field path | `categoryGroups[0].name` or `categoryGroups.0.name` | array item child |
//! | tree address | `fields.targeting.fields.countries.value` | one node property |
//!
//! Every key in [`FormState`] (errors, touched fields) uses the dotted form.

mod error;
mod form;
mod loader;
mod options;
mod path;
mod projector;
mod reconciler;
mod reducer;
mod review;
mod sources;
mod store;
mod types;
mod validator;

pub use error::{FieldError, LoadError, OptionsError, PathError, ValidateError};
pub use form::Form;
pub use loader::{
    is_url, load_fields, load_json, load_json_auto, load_json_str, load_schema,
    schema_from_value, MESSAGES_KEYWORD,
};
pub use options::{parse_options, LoadTicket, OptionsSource, StaticOptions};
pub use path::{
    build_path, canonicalize, from_pointer, parse_address, FieldPath, Segment, Target,
};
pub use projector::project;
pub use reconciler::{reconcile, visible_errors, Reconciliation, Visibility};
pub use reducer::{Action, FormState, Outcome, Reducer, SourceReducer};
pub use review::{format_value, initial_values, render, review, ReviewEntry, ReviewItem, ReviewLine};
pub use sources::{validate_project as validate_source, DataSource, UPDATE_BIDDING, UPDATE_BUDGET};
pub use types::{
    json_type_name, Coercion, DependsOn, FieldBody, FieldKind, FieldNode, FieldTree, Fields, Item,
    ScalarKind, SelectOption,
};
pub use validator::{
    canonical_errors, collect_errors, validate_project, ErrorMap, FnValidator, JsonSchema, Validate,
    ValidationResult, ValidationSchema, GENERAL_ERROR_KEY, GENERAL_ERROR_MESSAGE,
};

#[cfg(feature = "remote")]
pub use loader::load_json_url;
#[cfg(feature = "remote")]
pub use options::HttpOptionsSource;
