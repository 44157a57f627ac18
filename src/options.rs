//! Option lists for choice fields, fetched at runtime.
//!
//! An [`OptionsSource`] answers with the full option list for one field
//! path. Loads are tracked per field with a [`LoadTicket`]: only the ticket of
//! the newest load may deliver options or clear the loading flag, so a slow
//! response can never overwrite a newer one.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::OptionsError;
use crate::path::canonicalize;
use crate::types::SelectOption;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Timeout for option requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Something that can produce the option list of a field.
pub trait OptionsSource: Send + Sync {
    /// Fetch every option for `field` (a canonical path).
    ///
    /// # Errors
    ///
    /// Returns `OptionsError` when the options cannot be obtained.
    fn fetch(&self, field: &str) -> Result<Vec<SelectOption>, OptionsError>;
}

/// Proof that a load was started, identifying the field and its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    field: String,
    generation: u64,
}

impl LoadTicket {
    pub(crate) fn new(field: impl Into<String>, generation: u64) -> Self {
        Self {
            field: field.into(),
            generation,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Fixed option lists keyed by field path.
#[derive(Debug, Clone, Default)]
pub struct StaticOptions {
    options: BTreeMap<String, Vec<SelectOption>>,
}

impl StaticOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, options: Vec<SelectOption>) -> Self {
        self.options.insert(canonicalize(field), options);
        self
    }
}

impl OptionsSource for StaticOptions {
    fn fetch(&self, field: &str) -> Result<Vec<SelectOption>, OptionsError> {
        self.options
            .get(&canonicalize(field))
            .cloned()
            .ok_or_else(|| OptionsError::Unavailable {
                field: field.to_string(),
            })
    }
}

/// Options response body: `{"data": [...]}` or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum Payload {
    Wrapped { data: Vec<SelectOption> },
    Bare(Vec<SelectOption>),
}

/// Decode an options response body.
///
/// # Errors
///
/// Returns `OptionsError::InvalidPayload` if `body` is neither shape.
pub fn parse_options(field: &str, body: Value) -> Result<Vec<SelectOption>, OptionsError> {
    match serde_json::from_value(body) {
        Ok(Payload::Wrapped { data }) | Ok(Payload::Bare(data)) => Ok(data),
        Err(e) => Err(OptionsError::InvalidPayload {
            field: field.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Options served over HTTP at `{base_url}/{field}`.
///
/// Requires the `remote` feature (enabled by default).
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpOptionsSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpOptionsSource {
    /// # Errors
    ///
    /// Returns `LoadError::NetworkError` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, crate::error::LoadError> {
        let base_url = base_url.into();
        let client = reqwest::blocking::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|source| crate::error::LoadError::NetworkError {
                url: base_url.clone(),
                source,
            })?;
        Ok(Self { base_url, client })
    }

    fn url_for(&self, field: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), field)
    }
}

#[cfg(feature = "remote")]
impl OptionsSource for HttpOptionsSource {
    fn fetch(&self, field: &str) -> Result<Vec<SelectOption>, OptionsError> {
        let url = self.url_for(field);
        let network = |source| OptionsError::Network {
            field: field.to_string(),
            url: url.clone(),
            source,
        };

        log::debug!("fetching options for '{}' from {}", field, url);
        let body: Value = self
            .client
            .get(&url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json)
            .map_err(network)?;
        parse_options(field, body)
    }
}
