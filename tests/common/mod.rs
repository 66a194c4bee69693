//! Shared recording fakes for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use opentelemetry::propagation::Extractor;

use environ_trace::http::Environ;
use environ_trace::middleware::{AppError, BoxBody, HeaderList, Responder};
use environ_trace::observability::{
    AttributeValue, Attributes, RequestMetrics, RequestSpan, RequestTracer, SpanKind, SpanStatus,
};

/// Everything a span went through, kept after the span itself is gone.
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    pub name: String,
    pub kind: SpanKind,
    pub attributes: Attributes,
    pub status: SpanStatus,
    pub ended: usize,
    pub carrier: Vec<(String, String)>,
}

impl RecordedSpan {
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Tracer that keeps every span it starts.
#[derive(Clone)]
pub struct RecordingTracer {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
    recording: bool,
}

impl RecordingTracer {
    pub fn new() -> Self {
        Self {
            spans: Arc::default(),
            recording: true,
        }
    }

    /// Spans started by this tracer drop all attribute and status updates.
    pub fn non_recording() -> Self {
        Self {
            recording: false,
            ..Self::new()
        }
    }

    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans.lock().unwrap().clone()
    }

    /// The only span started so far.
    pub fn single_span(&self) -> RecordedSpan {
        let spans = self.spans();
        assert_eq!(spans.len(), 1, "expected exactly one span");
        spans[0].clone()
    }
}

impl RequestTracer for RecordingTracer {
    fn start_span(
        &self,
        name: &str,
        attributes: &Attributes,
        carrier: &dyn Extractor,
    ) -> Box<dyn RequestSpan> {
        let mut carrier_pairs: Vec<(String, String)> = carrier
            .keys()
            .into_iter()
            .map(|key| (key.to_string(), carrier.get(key).unwrap_or_default().to_string()))
            .collect();
        carrier_pairs.sort();

        let mut spans = self.spans.lock().unwrap();
        spans.push(RecordedSpan {
            name: name.to_string(),
            kind: SpanKind::Server,
            attributes: if self.recording {
                attributes.clone()
            } else {
                Attributes::new()
            },
            status: SpanStatus::Unset,
            ended: 0,
            carrier: carrier_pairs,
        });

        Box::new(RecordingSpan {
            spans: Arc::clone(&self.spans),
            index: spans.len() - 1,
            recording: self.recording,
        })
    }
}

struct RecordingSpan {
    spans: Arc<Mutex<Vec<RecordedSpan>>>,
    index: usize,
    recording: bool,
}

impl RecordingSpan {
    fn update(&self, f: impl FnOnce(&mut RecordedSpan)) {
        let mut spans = self.spans.lock().unwrap();
        f(&mut spans[self.index]);
    }
}

impl RequestSpan for RecordingSpan {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn kind(&self) -> SpanKind {
        SpanKind::Server
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        if self.recording {
            self.update(|span| {
                span.attributes.insert(key.to_string(), value);
            });
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if self.recording {
            self.update(|span| span.status = status);
        }
    }

    fn end(&mut self) {
        self.update(|span| span.ended += 1);
    }
}

#[derive(Debug, Default)]
struct MetricsState {
    durations: Vec<(u64, Attributes)>,
    active: i64,
    min_active: i64,
    active_labels: Vec<Attributes>,
}

/// Metric instruments that keep every measurement.
#[derive(Clone, Default)]
pub struct RecordingMetrics {
    state: Arc<Mutex<MetricsState>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn durations(&self) -> Vec<(u64, Attributes)> {
        self.state.lock().unwrap().durations.clone()
    }

    pub fn active(&self) -> i64 {
        self.state.lock().unwrap().active
    }

    pub fn min_active(&self) -> i64 {
        self.state.lock().unwrap().min_active
    }

    /// Labels of every counter change, in order.
    pub fn active_labels(&self) -> Vec<Attributes> {
        self.state.lock().unwrap().active_labels.clone()
    }
}

impl RequestMetrics for RecordingMetrics {
    fn record_duration(&self, duration_ms: u64, attributes: &Attributes) {
        self.state
            .lock()
            .unwrap()
            .durations
            .push((duration_ms, attributes.clone()));
    }

    fn add_active_requests(&self, delta: i64, attributes: &Attributes) {
        let mut state = self.state.lock().unwrap();
        state.active += delta;
        state.min_active = state.min_active.min(state.active);
        state.active_labels.push(attributes.clone());
    }
}

/// `start_response` calls seen by the server.
#[derive(Debug, Clone, Default)]
pub struct ServerResponse {
    calls: Arc<Mutex<Vec<(String, HeaderList)>>>,
}

impl ServerResponse {
    pub fn responder(&self) -> Responder {
        let calls = Arc::clone(&self.calls);
        Responder::new(
            move |status: &str,
                  headers: &[(String, String)],
                  _: Option<&AppError>|
                  -> Result<(), AppError> {
                calls
                    .lock()
                    .unwrap()
                    .push((status.to_string(), headers.to_vec()));
                Ok(())
            },
        )
    }

    pub fn calls(&self) -> Vec<(String, HeaderList)> {
        self.calls.lock().unwrap().clone()
    }
}

/// Drains `body`, stopping at the first failing chunk.
pub fn drain(body: BoxBody) -> Result<Vec<u8>, AppError> {
    let mut out = Vec::new();
    for chunk in body {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}

pub fn string(value: &str) -> AttributeValue {
    AttributeValue::String(value.to_string())
}

/// Request metadata for `method` and `path` on a plain HTTP server.
pub fn environ(method: &str, path: &str) -> Environ {
    Environ::new()
        .with("REQUEST_METHOD", method)
        .with("PATH_INFO", path)
        .with("SCRIPT_NAME", "")
        .with("QUERY_STRING", "")
        .with("SERVER_NAME", "127.0.0.1")
        .with("SERVER_PORT", "80")
        .with("SERVER_PROTOCOL", "HTTP/1.1")
        .with("URL_SCHEME", "http")
        .with("REMOTE_ADDR", "10.1.1.1")
}
