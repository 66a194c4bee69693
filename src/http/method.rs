//! HTTP method normalization.
//!
//! Nonstandard methods are folded into a single value to keep attribute
//! cardinality bounded, unless every method is explicitly captured.

/// Value recorded for methods outside [`KNOWN_METHODS`].
pub const NONSTANDARD_METHOD: &str = "NONSTANDARD";

pub const KNOWN_METHODS: &[&str] = &[
    "CONNECT", "DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT", "TRACE",
];

/// Upper-cases `method`, replacing unknown methods unless `capture_all` is set.
pub fn sanitize_method(method: &str, capture_all: bool) -> String {
    let method = method.to_ascii_uppercase();
    if capture_all || KNOWN_METHODS.contains(&method.as_str()) {
        method
    } else {
        NONSTANDARD_METHOD.to_string()
    }
}
