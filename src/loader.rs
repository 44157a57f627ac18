//! Loading field definitions and schemas from files, strings, and HTTP URLs.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;
use crate::types::FieldTree;
use crate::validator::JsonSchema;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Schema keyword holding per-path message overrides.
pub const MESSAGES_KEYWORD: &str = "x-messages";

/// Load a JSON document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_json_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_json_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Load a JSON document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails or the response
/// isn't valid JSON.
#[cfg(feature = "remote")]
pub fn load_json_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    // Check for HTTP errors before parsing
    client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .and_then(reqwest::blocking::Response::json)
        .map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a JSON document from a file path or URL.
///
/// URL loading requires the `remote` feature.
///
/// # Errors
///
/// Returns appropriate errors based on the source type.
pub fn load_json_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_json_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_json(Path::new(source))
    }
}

/// Load a field-definition document and parse it into a tree.
///
/// # Errors
///
/// Returns `LoadError` if the document cannot be read or is not a valid
/// definition.
pub fn load_fields(source: &str) -> Result<FieldTree, LoadError> {
    FieldTree::from_json(load_json_auto(source)?)
}

/// Load and compile a JSON Schema document.
///
/// # Errors
///
/// Returns `LoadError` if the document cannot be read or does not compile.
pub fn load_schema(source: &str) -> Result<JsonSchema, LoadError> {
    schema_from_value(&load_json_auto(source)?)
}

/// Compile a JSON Schema document, applying the message overrides listed
/// under its `x-messages` keyword (path to message).
///
/// # Errors
///
/// Returns `LoadError::Schema` if the schema does not compile, or
/// `LoadError::InvalidDefinition` if `x-messages` is not an object of strings.
pub fn schema_from_value(document: &Value) -> Result<JsonSchema, LoadError> {
    let schema = JsonSchema::new(document)?;
    let Some(messages) = document.get(MESSAGES_KEYWORD) else {
        return Ok(schema);
    };
    let messages = messages
        .as_object()
        .ok_or_else(|| LoadError::InvalidDefinition {
            message: format!("{} must be an object", MESSAGES_KEYWORD),
        })?;

    let mut overrides = Vec::with_capacity(messages.len());
    for (path, message) in messages {
        let message = message.as_str().ok_or_else(|| LoadError::InvalidDefinition {
            message: format!("{} entry '{}' must be a string", MESSAGES_KEYWORD, path),
        })?;
        overrides.push((path.as_str(), message));
    }
    Ok(schema.with_messages(overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{collect_errors, Validate};
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_json_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type": "object"}}"#).unwrap();

        let doc = load_json(file.path()).unwrap();
        assert_eq!(doc["type"], "object");
    }

    #[test]
    fn load_json_file_not_found() {
        let result = load_json(Path::new("/nonexistent/path.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_json_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_json(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_json_str_invalid() {
        let result = load_json_str("not json");
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/fields.json"));
        assert!(is_url("http://example.com/fields.json"));
        assert!(!is_url("/path/to/fields.json"));
        assert!(!is_url("fields.json"));
    }

    #[test]
    fn load_fields_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"projectName": {{"label": "Project Name", "type": "text", "value": ""}}}}"#
        )
        .unwrap();

        let tree = load_fields(file.path().to_str().unwrap()).unwrap();
        assert_eq!(tree.get("projectName").unwrap().label, "Project Name");
    }

    #[test]
    fn load_fields_rejects_bad_definition() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"projectName": {{"type": "slider"}}}}"#).unwrap();

        let err = load_fields(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, LoadError::InvalidDefinition { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn schema_messages_keyword_overrides() {
        let schema = schema_from_value(&json!({
            "type": "object",
            "properties": { "projectName": { "type": "string", "minLength": 1 } },
            "x-messages": { "projectName": "Project name is required" }
        }))
        .unwrap();
        let errors = collect_errors(schema.validate(&json!({ "projectName": "" })).unwrap());
        assert_eq!(errors["projectName"], "Project name is required");
    }

    #[test]
    fn schema_messages_must_be_strings() {
        let err = schema_from_value(&json!({
            "type": "object",
            "x-messages": { "projectName": 3 }
        }))
        .unwrap_err();
        assert!(matches!(err, LoadError::InvalidDefinition { .. }));
    }

    #[test]
    fn invalid_schema_is_a_schema_error() {
        let err = schema_from_value(&json!({ "type": 12 })).unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
    }

    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_json_url_valid() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/fields.json")
                .with_header("content-type", "application/json")
                .with_body(r#"{"projectName": {"type": "text"}}"#)
                .create();

            let doc = load_json_auto(&format!("{}/fields.json", server.url())).unwrap();
            assert_eq!(doc["projectName"]["type"], "text");
        }

        #[test]
        fn load_json_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let result = load_json_url(&format!("{}/missing.json", server.url()));
            let err = result.unwrap_err();
            assert!(matches!(err, LoadError::NetworkError { .. }));
            assert_eq!(err.exit_code(), 3);
        }
    }
}
