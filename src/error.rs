//! Error types for path resolution, validation, loading, and option fetching.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when a field path cannot be parsed or does not resolve
/// to a node of the expected kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty field path")]
    Empty,

    #[error("malformed field path \"{path}\": {reason}")]
    Malformed { path: String, reason: String },

    #[error("unknown field '{field}' in path \"{path}\"")]
    UnknownField { path: String, field: String },

    #[error("field '{field}' in path \"{path}\" has no child fields")]
    NotAContainer { path: String, field: String },

    #[error("array field '{field}' in path \"{path}\" must be followed by an item index")]
    MissingIndex { path: String, field: String },

    #[error("index {index} out of bounds for '{field}' ({len} items) in path \"{path}\"")]
    IndexOutOfBounds {
        path: String,
        field: String,
        index: usize,
        len: usize,
    },

    #[error("\"{path}\" has no {property}")]
    NoProperty {
        path: String,
        property: &'static str,
    },

    #[error("value for \"{path}\" must be {expected}")]
    NotAnItem { path: String, expected: &'static str },
}

/// Errors produced by a schema while validating form data.
///
/// These never escape the reducer: the reconciler turns them into a single
/// general error entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidateError {
    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation engine failure: {message}")]
    Engine { message: String },
}

/// Errors while loading field definitions or schemas.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid field definition: {message}")]
    InvalidDefinition { message: String },

    #[error("invalid action: {message}")]
    InvalidAction { message: String },

    #[error(transparent)]
    Schema(#[from] ValidateError),

    #[error("unknown data source \"{name}\": expected primary, secondary, or tertiary")]
    UnknownSource { name: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors from an options-loading collaborator.
#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("no options available for field '{field}'")]
    Unavailable { field: String },

    #[cfg(feature = "remote")]
    #[error("failed to fetch options for '{field}' from {url}: {source}")]
    Network {
        field: String,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid options payload for '{field}': {message}")]
    InvalidPayload { field: String, message: String },
}

/// A single field validation message, keyed by the path segments the
/// schema reported.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    /// Path segments from the data root (e.g. `["categoryGroups", "0", "name"]`).
    pub path: Vec<String>,
    /// Human-readable error message.
    pub message: String,
}

impl FieldError {
    pub fn new<I, S>(path: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }

    /// Dotted form of the reported path, before canonicalization.
    pub fn joined_path(&self) -> String {
        self.path.join(".")
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.joined_path(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("fields.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidDefinition {
            message: "unknown type".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = LoadError::Schema(ValidateError::InvalidSchema {
            message: "bad".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn field_error_display() {
        let err = FieldError::new(["categoryGroups", "0", "cpc"], "Max CPC is required");
        assert_eq!(err.to_string(), "categoryGroups.0.cpc: Max CPC is required");
    }

    #[test]
    fn path_error_messages_name_the_field() {
        let err = PathError::UnknownField {
            path: "targeting.regions".into(),
            field: "regions".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown field 'regions' in path \"targeting.regions\""
        );
    }
}
