//! Header capture subsystem.
//!
//! # Data Flow
//! ```text
//! CaptureConfig patterns
//!     → matcher.rs (compile literal / regex name patterns)
//!     → sanitize.rs (allow-list filter, redaction, attribute keys)
//!     → span attributes http.request.header.* / http.response.header.*
//!
//! Environ headers
//!     → carrier.rs (propagation getter for upstream trace context)
//! ```

pub mod carrier;
pub mod matcher;
pub mod sanitize;

pub use carrier::{inject_response_context, EnvironGetter, ResponsePropagationSetter};
pub use matcher::HeaderNameMatcher;
pub use sanitize::{
    normalize_request_header_name, normalize_response_header_name, HeaderSet, SanitizeValue,
    REDACTED,
};
