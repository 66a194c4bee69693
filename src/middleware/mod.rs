//! Request tracing middleware.
//!
//! # Data Flow
//! ```text
//! server → TraceMiddleware::handle (lifecycle.rs)
//!     → Application::call (app.rs)
//!         → InstrumentedStartResponse (response.rs) → server start_response
//!     → TracedBody (body.rs) → server drains, closes or drops it
//!         → the body may call InstrumentedStartResponse before its first chunk
//! ```
//!
//! # Design Decisions
//! - Span and metric finalization is tied to ownership: whoever holds the
//!   request state last finishes it, on every exit path
//! - The span is current only while the application or its body runs

pub mod app;
pub mod body;
pub mod lifecycle;
pub mod response;

pub use app::{
    app_fn, chunks_body, iter_body, AppError, AppFn, Application, BoxBody, HeaderList,
    Responder, ResponseBody, StartResponse,
};
pub use body::TracedBody;
pub use lifecycle::{TraceMiddleware, TraceMiddlewareBuilder};
pub use response::{RequestHook, ResponseHook};
