//! Request tracing middleware for CGI-style applications.

pub mod config;
pub mod headers;
pub mod http;
pub mod middleware;
pub mod observability;

pub use config::CaptureConfig;
pub use http::Environ;
pub use middleware::{app_fn, Application, Responder, StartResponse, TraceMiddleware, TracedBody};
pub use observability::{LogTracer, MetricsRecorder, OtelTracer};
