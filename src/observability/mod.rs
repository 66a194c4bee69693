//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! middleware produces:
//!     → span.rs (RequestTracer / RequestSpan seam)
//!         → otel.rs (OpenTelemetry tracer, default)
//!         → logging.rs (spans as log events)
//!     → metrics.rs (duration histogram, in-flight counter)
//! ```
//!
//! # Design Decisions
//! - Tracer and metric instruments are injected at construction, never looked
//!   up per request
//! - Structured logging through `tracing` for everything the middleware reports
//!   about itself

pub mod logging;
pub mod metrics;
pub mod otel;
pub mod span;

pub use logging::{init_logging, LogTracer};
pub use metrics::{MetricsRecorder, RequestMetrics};
pub use otel::OtelTracer;
pub use span::{
    AttributeValue, Attributes, RequestSpan, RequestTracer, SpanKind, SpanScope, SpanStatus,
};
