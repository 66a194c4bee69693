//! HTTP request and response semantics.
//!
//! # Data Flow
//! ```text
//! http::Request / server variables
//!     → environ.rs (Environ: CGI-style request metadata)
//!     → attributes.rs (semantic attributes, captured headers, metric labels)
//!         → method.rs (method normalization)
//!         → uri.rs (URL reconstruction, credential stripping)
//! response status line
//!     → status.rs (status code attribute, span outcome)
//! ```

pub mod attributes;
pub mod environ;
pub mod method;
pub mod status;
pub mod uri;

pub use attributes::{
    active_request_attributes, collect_request_attributes, default_span_name,
    duration_attributes, HeaderCapture,
};
pub use environ::Environ;
pub use status::{apply_response_attributes, parse_status_code};
