//! Validation reconciliation: run the schema over the projected data and
//! decide which errors are shown.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::path::{FieldPath, Segment};
use crate::validator::{
    collect_errors, ErrorMap, ValidationResult, ValidationSchema, GENERAL_ERROR_KEY,
};

/// Result of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Errors to display.
    pub errors: ErrorMap,
    /// Every error the schema reported, shown or not.
    pub full_errors: ErrorMap,
    /// `true` only when `full_errors` is empty.
    pub is_valid: bool,
}

/// Which errors may be shown.
#[derive(Debug, Clone, Copy)]
pub struct Visibility<'a> {
    pub touched: &'a BTreeSet<String>,
    pub validate_all: bool,
}

impl Visibility<'_> {
    fn shows(&self, path: &str) -> bool {
        self.validate_all || path == GENERAL_ERROR_KEY || self.touched.contains(path)
    }
}

/// Errors of `full` that `visibility` allows. The general error is always
/// shown.
pub fn visible_errors(full: &ErrorMap, visibility: Visibility<'_>) -> ErrorMap {
    full.iter()
        .filter(|(path, _)| visibility.shows(path))
        .map(|(path, message)| (path.clone(), message.clone()))
        .collect()
}

/// Re-validate after a change to `changed`.
///
/// Without a schema, only the changed field's own error is cleared and
/// validity is left as it was. With one, the whole of `form_data` is
/// validated; if the projection lacks the changed field, `changed_value` is
/// filled in at its path first. Schema failures (including panics) become the
/// single general error with `is_valid` false.
pub fn reconcile(
    form_data: Value,
    changed: &FieldPath,
    changed_value: Option<&Value>,
    schema: Option<&ValidationSchema>,
    visibility: Visibility<'_>,
    prior: &Reconciliation,
) -> Reconciliation {
    let Some(schema) = schema else {
        let key = changed.to_string();
        let mut next = prior.clone();
        next.errors.remove(&key);
        next.full_errors.remove(&key);
        return next;
    };

    let mut data = form_data;
    if let Some(value) = changed_value {
        fill_gap(&mut data, changed.segments(), value);
    }

    let full_errors = match schema.check(&data) {
        Ok(errors) => collect_errors(errors),
        Err(e) => {
            log::error!("validation of '{}' failed: {}", changed, e);
            ValidationResult::general_failure().errors
        }
    };

    Reconciliation {
        errors: visible_errors(&full_errors, visibility),
        is_valid: full_errors.is_empty(),
        full_errors,
    }
}

/// Write `value` at `segments` unless something is already there. Missing
/// objects along the way are created; arrays are never extended.
fn fill_gap(data: &mut Value, segments: &[Segment], value: &Value) {
    if value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty()) {
        return;
    }
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut cursor = data;
    for segment in parents {
        cursor = match (segment, cursor) {
            (Segment::Name(name), Value::Object(map)) => map
                .entry(name.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            (Segment::Index(index), Value::Array(items)) => match items.get_mut(*index) {
                Some(item) => item,
                None => return,
            },
            _ => return,
        };
    }

    if let (Segment::Name(name), Value::Object(map)) = (last, cursor) {
        map.entry(name.clone()).or_insert_with(|| value.clone());
    }
}
