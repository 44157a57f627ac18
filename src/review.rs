//! Human-readable summary of a form for the review step.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::{FieldBody, FieldKind, FieldNode, FieldTree, Fields, Item, ScalarKind};

/// Text shown for a value that was never filled in.
pub const NOT_SPECIFIED: &str = "Not specified";

/// One reviewed field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReviewEntry {
    Group {
        key: String,
        label: String,
        children: Vec<ReviewEntry>,
    },
    Array {
        key: String,
        label: String,
        count: usize,
        items: Vec<ReviewItem>,
    },
    Simple {
        key: String,
        label: String,
        value: String,
    },
}

/// One item of a reviewed array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub index: usize,
    pub fields: Vec<ReviewLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewLine {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// Display text for `value` as a value of `node`.
///
/// Empty values, including an empty selection, read "Not specified". Choice
/// fields show option labels (falling back to the raw value), arrays show an
/// item count, and any other nested object reads "Complex value".
pub fn format_value(value: Option<&Value>, node: &FieldNode) -> String {
    let value = match value {
        None | Some(Value::Null) => return NOT_SPECIFIED.to_string(),
        Some(Value::String(s)) if s.is_empty() => return NOT_SPECIFIED.to_string(),
        Some(Value::Array(values)) if values.is_empty() && node.kind() != FieldKind::Array => {
            return NOT_SPECIFIED.to_string()
        }
        Some(value) => value,
    };

    match value {
        Value::Array(values) => match node.kind() {
            FieldKind::Array => format!("{} items", values.len()),
            FieldKind::Multiselect | FieldKind::Checkboxes => values
                .iter()
                .map(|v| label_or_raw(node, v))
                .collect::<Vec<_>>()
                .join(", "),
            _ => values.iter().map(display).collect::<Vec<_>>().join(", "),
        },
        Value::Object(_) => "Complex value".to_string(),
        _ if is_single_choice(node) => label_or_raw(node, value),
        _ => display(value),
    }
}

fn is_single_choice(node: &FieldNode) -> bool {
    matches!(
        node.body,
        FieldBody::Scalar {
            kind: ScalarKind::Select | ScalarKind::Radio,
            ..
        }
    )
}

fn label_or_raw(node: &FieldNode, value: &Value) -> String {
    node.option_label(value)
        .map(str::to_string)
        .unwrap_or_else(|| display(value))
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Review entries for every field of `tree`, in definition order.
pub fn review(tree: &FieldTree) -> Vec<ReviewEntry> {
    review_fields(tree.fields(), "")
}

fn review_fields(fields: &Fields, parent: &str) -> Vec<ReviewEntry> {
    fields
        .iter()
        .map(|(name, node)| review_node(name, node, parent))
        .collect()
}

fn review_node(name: &str, node: &FieldNode, parent: &str) -> ReviewEntry {
    let key = if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    };
    let label = node.label.clone();

    match &node.body {
        FieldBody::Group { fields } => ReviewEntry::Group {
            children: review_fields(fields, &key),
            key,
            label,
        },
        FieldBody::Array { template, items } => ReviewEntry::Array {
            count: items.len(),
            items: items
                .iter()
                .enumerate()
                .map(|(index, item)| review_item(&key, template, index, item))
                .collect(),
            key,
            label,
        },
        FieldBody::Scalar { value, .. } => ReviewEntry::Simple {
            value: format_value(value.as_ref(), node),
            key,
            label,
        },
    }
}

fn review_item(key: &str, template: &Fields, index: usize, item: &Item) -> ReviewItem {
    ReviewItem {
        index,
        fields: template
            .iter()
            .map(|(child, node)| ReviewLine {
                key: format!("{}.{}.{}", key, index, child),
                label: node.label.clone(),
                value: format_value(item.get(child), node),
            })
            .collect(),
    }
}

/// Plain-text rendering of review entries, one line per value.
pub fn render(entries: &[ReviewEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        render_entry(&mut out, entry, 0);
    }
    out
}

fn render_entry(out: &mut String, entry: &ReviewEntry, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = |text: String| {
        out.push_str(&indent);
        out.push_str(&text);
        out.push('\n');
    };
    match entry {
        ReviewEntry::Simple { label, value, .. } => line(format!("{}: {}", label, value)),
        ReviewEntry::Group {
            label, children, ..
        } => {
            line(label.clone());
            if children.is_empty() {
                line(format!("  No {} data available", label.to_lowercase()));
            }
            for child in children {
                render_entry(out, child, depth + 1);
            }
        }
        ReviewEntry::Array {
            label,
            count,
            items,
            ..
        } => {
            line(format!("{} ({})", label, count));
            if items.is_empty() {
                line(format!("  No {} added", label.to_lowercase()));
            }
            let singular = label.strip_suffix('s').unwrap_or(label);
            for item in items {
                line(format!("  {} {}", singular, item.index + 1));
                for field in &item.fields {
                    line(format!("    {}: {}", field.label, field.value));
                }
            }
        }
    }
}

/// Blank starting values for every field: `false` for a checkbox, `[]` for
/// multi-choice and array fields, a nested object for a group, `""` otherwise.
pub fn initial_values(fields: &Fields) -> Value {
    let mut values = Map::new();
    for (name, node) in fields.iter() {
        let value = match &node.body {
            FieldBody::Group { fields } => initial_values(fields),
            FieldBody::Array { .. } => Value::Array(Vec::new()),
            FieldBody::Scalar { kind, .. } => kind.default_value(),
        };
        values.insert(name.to_string(), value);
    }
    Value::Object(values)
}
