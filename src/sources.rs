//! Built-in data sources.
//!
//! Each source supplies the initial field tree of its form, the schema the
//! form validates against, the fields whose options are loaded at runtime,
//! and optionally its own actions layered over the base reducer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{FieldError, LoadError, ValidateError};
use crate::form::Form;
use crate::path::FieldPath;
use crate::reducer::{Action, FormState, Outcome, SourceReducer};
use crate::types::FieldTree;
use crate::validator::{
    validate_project as validate_with, ErrorMap, JsonSchema, Validate, ValidationResult,
    ValidationSchema, GENERAL_ERROR_KEY,
};

/// Source action writing `budget.<field>`.
pub const UPDATE_BUDGET: &str = "UPDATE_BUDGET";
/// Source action writing `bidding.<field>`.
pub const UPDATE_BIDDING: &str = "UPDATE_BIDDING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    Primary,
    Secondary,
    Tertiary,
}

impl DataSource {
    pub const ALL: [DataSource; 3] = [
        DataSource::Primary,
        DataSource::Secondary,
        DataSource::Tertiary,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            DataSource::Primary => "primary",
            DataSource::Secondary => "secondary",
            DataSource::Tertiary => "tertiary",
        }
    }

    /// Initial field tree of this source's form.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidDefinition` if the built-in definition does
    /// not parse.
    pub fn fields(&self) -> Result<FieldTree, LoadError> {
        FieldTree::from_json(match self {
            DataSource::Primary => primary_fields(),
            DataSource::Secondary => secondary_fields(),
            DataSource::Tertiary => tertiary_fields(),
        })
    }

    /// Validation schema of this source's form.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidSchema` if the built-in schema does not
    /// compile.
    pub fn schema(&self) -> Result<ValidationSchema, ValidateError> {
        Ok(match self {
            DataSource::Primary => ValidationSchema::new(primary_schema()?),
            DataSource::Secondary => ValidationSchema::new(secondary_schema()?),
            DataSource::Tertiary => ValidationSchema::new(TertiarySchema {
                base: tertiary_schema()?,
            }),
        })
    }

    /// Fields whose option lists are fetched when the form opens.
    pub fn option_fields(&self) -> &'static [&'static str] {
        match self {
            DataSource::Primary => &["bidStrategy"],
            DataSource::Secondary => &["targeting.countries", "targeting.devices"],
            DataSource::Tertiary => &["projectObjective", "bidding.strategy"],
        }
    }

    /// Source-specific actions, if the source has any.
    pub fn reducer(&self) -> Option<Arc<dyn SourceReducer>> {
        match self {
            DataSource::Tertiary => Some(Arc::new(TertiaryReducer)),
            DataSource::Primary | DataSource::Secondary => None,
        }
    }

    /// A fresh form session for this source.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the built-in definition or schema is invalid.
    pub fn form(&self) -> Result<Form, LoadError> {
        let mut form = Form::new(self.fields()?).with_schema(self.schema()?);
        if let Some(reducer) = self.reducer() {
            form = form.with_source_reducer(reducer);
        }
        Ok(form)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for DataSource {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataSource::ALL
            .into_iter()
            .find(|source| source.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| LoadError::UnknownSource {
                name: s.to_string(),
            })
    }
}

/// Validate projected `data` against the named source's schema.
///
/// An unknown source name yields a failed result with the general error
/// "Invalid data source".
pub fn validate_project(source: &str, data: &Value) -> ValidationResult {
    let schema = source
        .parse::<DataSource>()
        .map_err(|e| e.to_string())
        .and_then(|source| source.schema().map_err(|e| e.to_string()));
    match schema {
        Ok(schema) => validate_with(data, &schema),
        Err(reason) => {
            log::warn!("cannot validate project: {}", reason);
            let mut errors = ErrorMap::new();
            errors.insert(GENERAL_ERROR_KEY.to_string(), "Invalid data source".to_string());
            ValidationResult {
                is_valid: false,
                errors,
            }
        }
    }
}

// --- Field definitions ---

fn primary_fields() -> Value {
    json!({
        "projectName": {
            "label": "Project Name",
            "type": "text",
            "required": true,
            "value": "",
            "description": "A unique name to identify your advertising project"
        },
        "dailyBudget": {
            "label": "Daily Budget",
            "type": "number",
            "required": true,
            "value": "",
            "description": "Maximum amount to spend per day on this advertising campaign"
        },
        "bidStrategy": {
            "label": "Bid Strategy",
            "type": "select",
            "required": true,
            "value": "",
            "loading": false,
            "options": [],
            "description": "Strategy that determines how bids are set for your ads"
        },
        "keywords": {
            "label": "Keywords",
            "type": "textarea",
            "required": true,
            "value": "",
            "placeholder": "Enter keywords separated by commas",
            "description": "Words or phrases that match your ads with user searches"
        },
        "categoryGroups": {
            "label": "Category Groups",
            "type": "array",
            "required": true,
            "value": [],
            "description": "Groups of related product categories for targeting",
            "fields": {
                "name": {
                    "label": "Group Name",
                    "type": "text",
                    "required": true,
                    "description": "Name for this category group"
                },
                "cpc": {
                    "label": "Max CPC",
                    "type": "number",
                    "required": true,
                    "description": "Maximum cost-per-click bid for this category group"
                }
            }
        }
    })
}

fn secondary_fields() -> Value {
    json!({
        "projectName": { "label": "Project Name", "type": "text", "required": true, "value": "" },
        "targetUrl": { "label": "Target URL", "type": "url", "required": true, "value": "" },
        "bidAmount": { "label": "Bid Amount", "type": "number", "required": true, "value": "" },
        "dailyBudget": { "label": "Daily Budget", "type": "number", "required": true, "value": "" },
        "targeting": {
            "label": "Targeting",
            "type": "group",
            "fields": {
                "countries": {
                    "label": "Countries",
                    "type": "multiselect",
                    "options": [],
                    "required": true,
                    "value": [],
                    "loading": false
                },
                "devices": {
                    "label": "Devices",
                    "type": "checkboxes",
                    "options": [],
                    "required": true,
                    "value": [],
                    "loading": false
                }
            }
        }
    })
}

fn tertiary_fields() -> Value {
    json!({
        "projectName": { "label": "Project Name", "type": "text", "required": true, "value": "" },
        "projectObjective": {
            "label": "Project Objective",
            "type": "select",
            "required": true,
            "value": "",
            "loading": false,
            "options": []
        },
        "startDate": { "label": "Start Date", "type": "date", "required": true, "value": "" },
        "endDate": { "label": "End Date", "type": "date", "required": false, "value": "" },
        "budget": {
            "label": "Budget",
            "type": "group",
            "fields": {
                "amount": { "label": "Amount", "type": "number", "required": true, "value": "" },
                "type": {
                    "label": "Budget Type",
                    "type": "select",
                    "required": true,
                    "value": "",
                    "options": [
                        { "value": "daily", "label": "Daily Budget" },
                        { "value": "lifetime", "label": "Lifetime Budget" }
                    ]
                }
            }
        },
        "bidding": {
            "label": "Bidding",
            "type": "group",
            "fields": {
                "strategy": {
                    "label": "Bidding Strategy",
                    "type": "select",
                    "options": [],
                    "required": true,
                    "value": "",
                    "loading": false
                },
                "amount": {
                    "label": "Bid Amount",
                    "type": "number",
                    "required": false,
                    "value": "",
                    "dependsOn": { "field": "strategy", "value": "manual" }
                }
            }
        }
    })
}

// --- Schemas ---

const PROJECT_NAME_REQUIRED: &str = "Project name is required";
const ISO_DATE: &str = "^[0-9]{4}-[0-9]{2}-[0-9]{2}";

fn primary_schema() -> Result<JsonSchema, ValidateError> {
    Ok(JsonSchema::new(&json!({
        "type": "object",
        "properties": {
            "projectName": { "type": "string", "minLength": 1 },
            "dailyBudget": { "type": "number", "minimum": 1 },
            "bidStrategy": { "type": "string", "minLength": 1 },
            "keywords": { "type": "string", "minLength": 1 },
            "categoryGroups": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "minLength": 1 },
                        "cpc": {
                            "anyOf": [
                                { "type": "number", "exclusiveMinimum": 0 },
                                { "type": "string", "pattern": "^[0-9]*\\.?[0-9]+$" }
                            ]
                        }
                    },
                    "required": ["name", "cpc"]
                }
            }
        },
        "required": ["projectName", "dailyBudget", "bidStrategy", "keywords", "categoryGroups"]
    }))?
    .with_messages([
        ("projectName", PROJECT_NAME_REQUIRED),
        ("dailyBudget", "Daily budget must be a number of at least $1"),
        ("bidStrategy", "Bid strategy is required"),
        ("keywords", "At least one keyword is required"),
        ("categoryGroups", "Add at least one category group"),
        ("categoryGroups.*.name", "Group name is required"),
        ("categoryGroups.*.cpc", "Max CPC must be a positive number"),
    ]))
}

fn secondary_schema() -> Result<JsonSchema, ValidateError> {
    Ok(JsonSchema::new(&json!({
        "type": "object",
        "properties": {
            "projectName": { "type": "string", "minLength": 1 },
            "targetUrl": { "type": "string", "pattern": "^https?://[^\\s/$.?#].[^\\s]*$" },
            "bidAmount": { "type": "number", "minimum": 0.01 },
            "dailyBudget": { "type": "number", "minimum": 1 },
            "targeting": {
                "type": "object",
                "properties": {
                    "countries": { "type": "array", "minItems": 1 },
                    "devices": { "type": "array", "minItems": 1 }
                },
                "required": ["countries", "devices"]
            }
        },
        "required": ["projectName", "targetUrl", "bidAmount", "dailyBudget", "targeting"]
    }))?
    .with_messages([
        ("projectName", PROJECT_NAME_REQUIRED),
        ("targetUrl", "Target URL must be a valid http(s) URL"),
        ("bidAmount", "Bid amount must be at least $0.01"),
        ("dailyBudget", "Daily budget must be a number of at least $1"),
        ("targeting.countries", "Select at least one country"),
        ("targeting.devices", "Select at least one device"),
    ]))
}

fn tertiary_schema() -> Result<JsonSchema, ValidateError> {
    Ok(JsonSchema::new(&json!({
        "type": "object",
        "properties": {
            "projectName": { "type": "string", "minLength": 1 },
            "projectObjective": { "enum": ["visits", "awareness", "conversions"] },
            "startDate": { "type": "string", "pattern": ISO_DATE },
            "endDate": {
                "anyOf": [
                    { "type": "null" },
                    { "const": "" },
                    { "type": "string", "pattern": ISO_DATE }
                ]
            },
            "budget": {
                "type": "object",
                "properties": {
                    "amount": { "type": "number", "minimum": 10 },
                    "type": { "enum": ["daily", "lifetime"] }
                },
                "required": ["amount", "type"]
            },
            "bidding": {
                "type": "object",
                "properties": {
                    "strategy": { "enum": ["manual", "auto"] }
                },
                "required": ["strategy"],
                "if": {
                    "properties": { "strategy": { "const": "manual" } },
                    "required": ["strategy"]
                },
                "then": {
                    "properties": { "amount": { "type": "number", "minimum": 0.01 } },
                    "required": ["amount"]
                }
            }
        },
        "required": ["projectName", "projectObjective", "startDate", "budget", "bidding"]
    }))?
    .with_messages([
        ("projectName", PROJECT_NAME_REQUIRED),
        ("projectObjective", "Please select a valid project objective"),
        ("startDate", "Start date must be a valid date"),
        ("endDate", "End date must be a valid date"),
        ("budget.amount", "Budget amount must be at least $10"),
        ("budget.type", "Please select a valid budget type"),
        ("bidding.strategy", "Please select a valid bid strategy"),
        ("bidding.amount", "Bid amount is required for manual bidding"),
    ]))
}

/// Tertiary rules: the JSON schema plus end date not before start date.
struct TertiarySchema {
    base: JsonSchema,
}

impl Validate for TertiarySchema {
    fn validate(&self, data: &Value) -> Result<Vec<FieldError>, ValidateError> {
        let mut errors = self.base.validate(data)?;
        if let (Some(start), Some(end)) = (iso_date(data, "startDate"), iso_date(data, "endDate")) {
            // ISO dates order lexicographically.
            if end < start {
                errors.push(FieldError::new(["endDate"], "End date must be after start date"));
            }
        }
        Ok(errors)
    }
}

fn iso_date<'a>(data: &'a Value, name: &str) -> Option<&'a str> {
    data.get(name)?.as_str()?.get(..10)
}

/// Handles `UPDATE_BUDGET` and `UPDATE_BIDDING` with payload
/// `{"field": ..., "value": ...}`.
struct TertiaryReducer;

impl SourceReducer for TertiaryReducer {
    fn reduce(&self, state: &FormState, action: &Action) -> Outcome {
        let Action::Source { name, payload } = action else {
            return Outcome::Unhandled;
        };
        let group = match name.as_str() {
            UPDATE_BUDGET => "budget",
            UPDATE_BIDDING => "bidding",
            _ => return Outcome::Unhandled,
        };

        let field = payload.get("field").and_then(Value::as_str);
        let (Some(field), Some(value)) = (field, payload.get("value")) else {
            log::warn!("{} needs a payload with 'field' and 'value'", name);
            return Outcome::Handled(state.clone());
        };

        let path = match FieldPath::parse(group) {
            Ok(group) => group.child(field),
            Err(e) => {
                log::warn!("{} rejected: {}", name, e);
                return Outcome::Handled(state.clone());
            }
        };
        match state.fields.set_value(&path, value.clone()) {
            Ok(fields) => {
                let mut next = state.clone();
                next.fields = fields;
                next.touched_fields.insert(path.to_string());
                Outcome::Handled(next)
            }
            Err(e) => {
                log::warn!("{} rejected: {}", name, e);
                Outcome::Handled(state.clone())
            }
        }
    }
}
