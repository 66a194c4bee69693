//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Allow-list of request header names (literal or regex) to capture.
pub const CAPTURE_HEADERS_SERVER_REQUEST: &str =
    "OTEL_INSTRUMENTATION_HTTP_CAPTURE_HEADERS_SERVER_REQUEST";

/// Allow-list of response header names (literal or regex) to capture.
pub const CAPTURE_HEADERS_SERVER_RESPONSE: &str =
    "OTEL_INSTRUMENTATION_HTTP_CAPTURE_HEADERS_SERVER_RESPONSE";

/// Header names (literal or regex) whose captured values are redacted.
pub const CAPTURE_HEADERS_SANITIZE_FIELDS: &str =
    "OTEL_INSTRUMENTATION_HTTP_CAPTURE_HEADERS_SANITIZE_FIELDS";

/// Keeps nonstandard HTTP methods instead of folding them into one value.
pub const CAPTURE_ALL_METHODS: &str = "OTEL_INSTRUMENTATION_HTTP_CAPTURE_ALL_METHODS";

/// Header capture and method normalization settings.
///
/// The default captures no headers, redacts nothing and normalizes methods.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Request header patterns to capture as span attributes.
    pub server_request: Vec<String>,

    /// Response header patterns to capture as span attributes.
    pub server_response: Vec<String>,

    /// Header patterns whose values are replaced with `[REDACTED]`.
    pub sanitize_fields: Vec<String>,

    /// Record every HTTP method verbatim.
    pub capture_all_methods: bool,
}

impl CaptureConfig {
    /// Builds the configuration from an environment-style key/value lookup.
    ///
    /// Missing keys fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let list = |key: &str| lookup(key).map(|value| split_list(&value)).unwrap_or_default();
        Self {
            server_request: list(CAPTURE_HEADERS_SERVER_REQUEST),
            server_response: list(CAPTURE_HEADERS_SERVER_RESPONSE),
            sanitize_fields: list(CAPTURE_HEADERS_SANITIZE_FIELDS),
            capture_all_methods: lookup(CAPTURE_ALL_METHODS)
                .map(|value| is_truthy(&value))
                .unwrap_or(false),
        }
    }

    /// Builds the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

/// Splits a comma-delimited list, trimming entries and dropping empty ones.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
