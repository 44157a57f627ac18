//! Field definitions and the persistent field tree.
//!
//! The JSON definition format is the one consumed at session start:
//!
//! ```json
//! {
//!   "projectName": { "label": "Project Name", "type": "text", "required": true, "value": "" },
//!   "targeting": {
//!     "label": "Targeting",
//!     "type": "group",
//!     "fields": {
//!       "countries": { "label": "Countries", "type": "multiselect", "options": [], "value": [] }
//!     }
//!   }
//! }
//! ```

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::LoadError;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One entry of a choice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: Value,
    pub label: String,
}

impl SelectOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Visibility condition on a sibling field's value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependsOn {
    pub field: String,
    pub value: Value,
}

/// The `type` tag of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Text,
    Number,
    Select,
    Date,
    Url,
    Textarea,
    Checkbox,
    Radio,
    Multiselect,
    Checkboxes,
}

/// How the projector turns a stored scalar into validation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Number,
    Boolean,
    Sequence,
    Verbatim,
}

impl ScalarKind {
    pub fn coercion(&self) -> Coercion {
        match self {
            ScalarKind::Number => Coercion::Number,
            ScalarKind::Checkbox => Coercion::Boolean,
            ScalarKind::Multiselect | ScalarKind::Checkboxes => Coercion::Sequence,
            ScalarKind::Text
            | ScalarKind::Select
            | ScalarKind::Date
            | ScalarKind::Url
            | ScalarKind::Textarea
            | ScalarKind::Radio => Coercion::Verbatim,
        }
    }

    /// Whether values are looked up in the node's option list.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            ScalarKind::Select | ScalarKind::Radio | ScalarKind::Multiselect | ScalarKind::Checkboxes
        )
    }

    /// Value a freshly created field of this kind starts with.
    pub fn default_value(&self) -> Value {
        match self {
            ScalarKind::Checkbox => Value::Bool(false),
            ScalarKind::Multiselect | ScalarKind::Checkboxes => Value::Array(Vec::new()),
            _ => Value::String(String::new()),
        }
    }
}

/// The full `type` tag vocabulary of the definition format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Number,
    Select,
    Date,
    Url,
    Textarea,
    Checkbox,
    Radio,
    Multiselect,
    Checkboxes,
    Group,
    Array,
}

impl FieldKind {
    fn scalar(self) -> Option<ScalarKind> {
        let kind = match self {
            FieldKind::Text => ScalarKind::Text,
            FieldKind::Number => ScalarKind::Number,
            FieldKind::Select => ScalarKind::Select,
            FieldKind::Date => ScalarKind::Date,
            FieldKind::Url => ScalarKind::Url,
            FieldKind::Textarea => ScalarKind::Textarea,
            FieldKind::Checkbox => ScalarKind::Checkbox,
            FieldKind::Radio => ScalarKind::Radio,
            FieldKind::Multiselect => ScalarKind::Multiselect,
            FieldKind::Checkboxes => ScalarKind::Checkboxes,
            FieldKind::Group | FieldKind::Array => return None,
        };
        Some(kind)
    }
}

impl From<ScalarKind> for FieldKind {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Text => FieldKind::Text,
            ScalarKind::Number => FieldKind::Number,
            ScalarKind::Select => FieldKind::Select,
            ScalarKind::Date => FieldKind::Date,
            ScalarKind::Url => FieldKind::Url,
            ScalarKind::Textarea => FieldKind::Textarea,
            ScalarKind::Checkbox => FieldKind::Checkbox,
            ScalarKind::Radio => FieldKind::Radio,
            ScalarKind::Multiselect => FieldKind::Multiselect,
            ScalarKind::Checkboxes => FieldKind::Checkboxes,
        }
    }
}

/// One array item: child name to stored scalar.
pub type Item = Map<String, Value>;

/// Kind-specific part of a field node.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldBody {
    Scalar {
        kind: ScalarKind,
        /// `None` means the value is undefined.
        value: Option<Value>,
    },
    Group {
        fields: Fields,
    },
    Array {
        /// Shape of one item.
        template: Fields,
        items: Vec<Item>,
    },
}

/// A node of the field tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub struct FieldNode {
    pub label: String,
    pub required: bool,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    pub loading: bool,
    pub options: Option<Vec<SelectOption>>,
    pub depends_on: Option<DependsOn>,
    pub body: FieldBody,
}

impl FieldNode {
    /// A scalar node with an empty label.
    pub fn scalar(kind: ScalarKind, value: Option<Value>) -> Self {
        Self::with_body(FieldBody::Scalar { kind, value })
    }

    pub fn group(fields: Fields) -> Self {
        Self::with_body(FieldBody::Group { fields })
    }

    pub fn array(template: Fields, items: Vec<Item>) -> Self {
        Self::with_body(FieldBody::Array { template, items })
    }

    fn with_body(body: FieldBody) -> Self {
        Self {
            label: String::new(),
            required: false,
            description: None,
            placeholder: None,
            loading: false,
            options: None,
            depends_on: None,
            body,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn kind(&self) -> FieldKind {
        match &self.body {
            FieldBody::Scalar { kind, .. } => (*kind).into(),
            FieldBody::Group { .. } => FieldKind::Group,
            FieldBody::Array { .. } => FieldKind::Array,
        }
    }

    /// Child fields of a group, or the item template of an array.
    pub fn children(&self) -> Option<&Fields> {
        match &self.body {
            FieldBody::Group { fields } => Some(fields),
            FieldBody::Array { template, .. } => Some(template),
            FieldBody::Scalar { .. } => None,
        }
    }

    /// The stored value as JSON. Groups have none; arrays yield their items.
    pub fn value(&self) -> Option<Value> {
        match &self.body {
            FieldBody::Scalar { value, .. } => value.clone(),
            FieldBody::Group { .. } => None,
            FieldBody::Array { items, .. } => Some(Value::Array(
                items.iter().cloned().map(Value::Object).collect(),
            )),
        }
    }

    /// Label of the option whose value equals `value`.
    pub fn option_label(&self, value: &Value) -> Option<&str> {
        self.options
            .as_ref()?
            .iter()
            .find(|option| &option.value == value)
            .map(|option| option.label.as_str())
    }

    /// A new array item with every template child set to `""`.
    pub fn empty_item(&self) -> Option<Item> {
        match &self.body {
            FieldBody::Array { template, .. } => Some(
                template
                    .names()
                    .map(|name| (name.to_string(), Value::String(String::new())))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Copy of this node that shares no allocation with `self`.
    fn detached(&self) -> Self {
        let body = match &self.body {
            FieldBody::Scalar { kind, value } => FieldBody::Scalar {
                kind: *kind,
                value: value.clone(),
            },
            FieldBody::Group { fields } => FieldBody::Group {
                fields: fields.detached(),
            },
            FieldBody::Array { template, items } => FieldBody::Array {
                template: template.detached(),
                items: items.clone(),
            },
        };
        Self {
            body,
            ..self.clone()
        }
    }
}

/// Ordered, persistent map from child name to node.
///
/// Cloning is cheap. Updates copy the map of `Arc`s and replace one entry, so
/// untouched siblings keep their identity (see [`Fields::same_node`]).
#[derive(Debug, Clone, Default)]
pub struct Fields(Arc<IndexMap<String, Arc<FieldNode>>>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.0.get(name).map(Arc::as_ref)
    }

    pub fn node(&self, name: &str) -> Option<&Arc<FieldNode>> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldNode)> {
        self.0.iter().map(|(name, node)| (name.as_str(), node.as_ref()))
    }

    /// New map with `name` replaced (or appended). Other entries are shared.
    pub fn with(&self, name: &str, node: FieldNode) -> Self {
        let mut map: IndexMap<String, Arc<FieldNode>> = (*self.0).clone();
        map.insert(name.to_string(), Arc::new(node));
        Self(Arc::new(map))
    }

    /// Whether both maps are the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Whether `name` refers to the same node allocation in both maps.
    pub fn same_node(&self, other: &Self, name: &str) -> bool {
        match (self.node(name), other.node(name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn detached(&self) -> Self {
        self.iter()
            .map(|(name, node)| (name.to_string(), node.detached()))
            .collect()
    }
}

impl PartialEq for Fields {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0 == other.0
    }
}

impl FromIterator<(String, FieldNode)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, FieldNode)>>(iter: I) -> Self {
        Self(Arc::new(
            iter.into_iter()
                .map(|(name, node)| (name, Arc::new(node)))
                .collect(),
        ))
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = IndexMap::<String, FieldNode>::deserialize(deserializer)?;
        Ok(map.into_iter().collect())
    }
}

/// The root of a form: top-level field name to node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldTree {
    root: Fields,
}

impl FieldTree {
    pub fn new(root: Fields) -> Self {
        Self { root }
    }

    /// Parse a tree from its JSON definition.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDefinition` when the document does not match
    /// the definition format.
    pub fn from_json(definition: Value) -> Result<Self, LoadError> {
        serde_json::from_value(definition).map_err(|e| LoadError::InvalidDefinition {
            message: e.to_string(),
        })
    }

    pub fn fields(&self) -> &Fields {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<&FieldNode> {
        self.root.get(name)
    }

    /// Whether both trees share the same root allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.root.ptr_eq(&other.root)
    }

    /// Deep copy with no shared allocations.
    pub fn detached(&self) -> Self {
        Self {
            root: self.root.detached(),
        }
    }
}

// --- Definition format ---

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(rename = "type")]
    kind: FieldKind,
    #[serde(default)]
    label: String,
    #[serde(default)]
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    placeholder: Option<String>,
    #[serde(default)]
    loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<SelectOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depends_on: Option<DependsOn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fields: Option<Fields>,
}

impl TryFrom<RawField> for FieldNode {
    type Error = String;

    fn try_from(raw: RawField) -> Result<Self, Self::Error> {
        let body = match (raw.kind.scalar(), raw.kind) {
            (Some(kind), _) => {
                if raw.fields.is_some() {
                    return Err(format!("{:?} field cannot declare child fields", raw.kind));
                }
                FieldBody::Scalar {
                    kind,
                    value: raw.value,
                }
            }
            (None, FieldKind::Group) => {
                if raw.value.is_some() {
                    return Err(format!("group '{}' cannot declare a value", raw.label));
                }
                FieldBody::Group {
                    fields: raw.fields.unwrap_or_default(),
                }
            }
            (None, _) => FieldBody::Array {
                template: raw.fields.unwrap_or_default(),
                items: parse_items(raw.value, &raw.label)?,
            },
        };

        Ok(Self {
            label: raw.label,
            required: raw.required,
            description: raw.description,
            placeholder: raw.placeholder,
            loading: raw.loading,
            options: raw.options,
            depends_on: raw.depends_on,
            body,
        })
    }
}

fn parse_items(value: Option<Value>, label: &str) -> Result<Vec<Item>, String> {
    match value {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(format!(
                    "array '{}' items must be objects, got {}",
                    label,
                    json_type_name(&other)
                )),
            })
            .collect(),
        Some(other) => Err(format!(
            "array '{}' value must be an array, got {}",
            label,
            json_type_name(&other)
        )),
    }
}

impl From<FieldNode> for RawField {
    fn from(node: FieldNode) -> Self {
        let kind = node.kind();
        let (value, fields) = match node.body {
            FieldBody::Scalar { value, .. } => (value, None),
            FieldBody::Group { fields } => (None, Some(fields)),
            FieldBody::Array { template, items } => (
                Some(Value::Array(items.into_iter().map(Value::Object).collect())),
                Some(template),
            ),
        };
        Self {
            kind,
            label: node.label,
            required: node.required,
            description: node.description,
            placeholder: node.placeholder,
            loading: node.loading,
            options: node.options,
            depends_on: node.depends_on,
            value,
            fields,
        }
    }
}
