//! Captured header values and their redaction.

use std::collections::BTreeMap;

use crate::headers::matcher::HeaderNameMatcher;
use crate::observability::span::{AttributeValue, Attributes};

/// Replacement for the value of a sanitized header.
pub const REDACTED: &str = "[REDACTED]";

const REQUEST_HEADER_PREFIX: &str = "http.request.header.";
const RESPONSE_HEADER_PREFIX: &str = "http.response.header.";

/// Header names (lower-cased) mapped to their values in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: BTreeMap<String, Vec<String>>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from `(name, value)` pairs; repeated names accumulate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut set = Self::new();
        for (name, value) in pairs {
            set.append(name.as_ref(), value);
        }
        set
    }

    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.headers
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }
}

/// Attribute key for a captured request header.
pub fn normalize_request_header_name(name: &str) -> String {
    format!(
        "{}{}",
        REQUEST_HEADER_PREFIX,
        name.to_ascii_lowercase().replace('-', "_")
    )
}

/// Attribute key for a captured response header.
pub fn normalize_response_header_name(name: &str) -> String {
    format!(
        "{}{}",
        RESPONSE_HEADER_PREFIX,
        name.to_ascii_lowercase().replace('-', "_")
    )
}

/// Redacts header values whose names match the sanitize list.
#[derive(Debug, Clone, Default)]
pub struct SanitizeValue {
    sanitized_fields: HeaderNameMatcher,
}

impl SanitizeValue {
    pub fn new(sanitized_fields: HeaderNameMatcher) -> Self {
        Self { sanitized_fields }
    }

    /// Returns `value`, or [`REDACTED`] when `name` is a sanitized field.
    pub fn sanitize_header_value<'a>(&self, name: &str, value: &'a str) -> &'a str {
        if self.sanitized_fields.matches(name) {
            REDACTED
        } else {
            value
        }
    }

    /// Builds span attributes for every header in `headers` that `allowed`
    /// matches.
    ///
    /// Each attribute holds a single-element list with the comma-joined
    /// values of the header, or [`REDACTED`].
    pub fn sanitize_header_values(
        &self,
        headers: &HeaderSet,
        allowed: &HeaderNameMatcher,
        normalize: fn(&str) -> String,
    ) -> Attributes {
        let mut attributes = Attributes::new();
        if allowed.is_empty() {
            return attributes;
        }

        for (name, values) in headers.iter() {
            if values.is_empty() || !allowed.matches(name) {
                continue;
            }
            let joined = values.join(",");
            let value = self.sanitize_header_value(name, &joined).to_string();
            attributes.insert(normalize(name), AttributeValue::StringArray(vec![value]));
        }
        attributes
    }
}
