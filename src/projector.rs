//! Projection of the field tree into plain validation data.

use serde_json::{Map, Number, Value};

use crate::types::{Coercion, FieldBody, FieldTree, Fields};

/// Build the data object a schema validates.
///
/// Groups become nested objects, arrays pass their items through unchanged,
/// and scalars are coerced per kind (see [`Coercion`]). Fields whose value is
/// undefined, `null`, or cannot be coerced are omitted rather than emitted as
/// `null`. Number fields holding blank text are treated as unset so that a
/// required-number rule reports them.
pub fn project(tree: &FieldTree) -> Value {
    Value::Object(project_fields(tree.fields()))
}

fn project_fields(fields: &Fields) -> Map<String, Value> {
    let mut data = Map::new();
    for (name, node) in fields.iter() {
        let projected = match &node.body {
            FieldBody::Scalar { kind, value } => value
                .as_ref()
                .and_then(|value| coerce(kind.coercion(), value)),
            FieldBody::Group { fields } => Some(Value::Object(project_fields(fields))),
            FieldBody::Array { items, .. } => Some(Value::Array(
                items.iter().cloned().map(Value::Object).collect(),
            )),
        };
        if let Some(value) = projected {
            data.insert(name.to_string(), value);
        }
    }
    data
}

fn coerce(coercion: Coercion, value: &Value) -> Option<Value> {
    if value.is_null() {
        return None;
    }
    match coercion {
        Coercion::Number => coerce_number(value),
        Coercion::Boolean => Some(Value::Bool(truthy(value))),
        Coercion::Sequence => value.is_array().then(|| value.clone()),
        Coercion::Verbatim => Some(value.clone()),
    }
}

/// Numeric text becomes a number. Unparsable text is kept so the schema's
/// type check reports it.
fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if let Ok(int) = text.parse::<i64>() {
                return Some(Value::from(int));
            }
            match text.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(number) => Some(Value::Number(number)),
                None => Some(value.clone()),
            }
        }
        _ => Some(value.clone()),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
