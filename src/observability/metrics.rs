//! Request metrics.
//!
//! # Metrics
//! - `http.server.duration` (histogram, ms): one record per request
//! - `http.server.active_requests` (up/down counter): requests in flight
//!
//! # Design Decisions
//! - Instruments go through the `metrics` facade; whichever recorder is
//!   installed (Prometheus in the CLI) owns the concurrency story
//! - Span attributes become metric labels verbatim

use metrics::{Label, Unit};

use crate::observability::span::Attributes;

/// Duration histogram name.
pub const HTTP_SERVER_DURATION: &str = "http.server.duration";

/// In-flight request counter name.
pub const HTTP_SERVER_ACTIVE_REQUESTS: &str = "http.server.active_requests";

/// Metric instruments shared by every request handled by one middleware.
pub trait RequestMetrics: Send + Sync {
    /// Records the elapsed time of one request in milliseconds.
    fn record_duration(&self, duration_ms: u64, attributes: &Attributes);

    /// Moves the in-flight request count by `delta`.
    fn add_active_requests(&self, delta: i64, attributes: &Attributes);
}

/// [`RequestMetrics`] backed by the `metrics` crate.
#[derive(Debug, Clone, Copy)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Registers instrument descriptions with the installed recorder.
    pub fn new() -> Self {
        metrics::describe_histogram!(
            HTTP_SERVER_DURATION,
            Unit::Milliseconds,
            "Duration of inbound HTTP requests."
        );
        metrics::describe_gauge!(
            HTTP_SERVER_ACTIVE_REQUESTS,
            Unit::Count,
            "Number of concurrent HTTP requests that are currently in-flight."
        );
        Self
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

fn labels(attributes: &Attributes) -> Vec<Label> {
    attributes
        .iter()
        .map(|(key, value)| Label::new(key.clone(), value.to_string()))
        .collect()
}

impl RequestMetrics for MetricsRecorder {
    fn record_duration(&self, duration_ms: u64, attributes: &Attributes) {
        metrics::histogram!(HTTP_SERVER_DURATION, labels(attributes)).record(duration_ms as f64);
    }

    fn add_active_requests(&self, delta: i64, attributes: &Attributes) {
        let gauge = metrics::gauge!(HTTP_SERVER_ACTIVE_REQUESTS, labels(attributes));
        if delta >= 0 {
            gauge.increment(delta as f64);
        } else {
            gauge.decrement(delta.unsigned_abs() as f64);
        }
    }
}
