//! Response body wrapper with guaranteed finalization.
//!
//! # Responsibilities
//! - Keep the request span current while the body produces chunks
//! - Close the application body and end the span exactly once
//! - Settle request metrics when the request is finished
//!
//! Finalization runs on the first of: exhaustion, a failing chunk, an
//! explicit [`ResponseBody::close`], or drop. The server stopping iteration
//! early is covered by the latter two.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use bytes::Bytes;

use crate::middleware::app::{AppError, BoxBody, ResponseBody};
use crate::observability::metrics::RequestMetrics;
use crate::observability::span::{Attributes, RequestSpan, SpanScope, SpanStatus};

/// State of one request, shared by the body and the instrumented
/// `start_response` until the request is finished.
pub(crate) struct RequestState {
    /// `None` once the span has been ended.
    pub(crate) span: Option<Box<dyn RequestSpan>>,
    pub(crate) duration_attributes: Attributes,
}

#[derive(Clone)]
pub(crate) struct SharedRequest(Arc<Mutex<RequestState>>);

impl SharedRequest {
    pub(crate) fn new(span: Box<dyn RequestSpan>, duration_attributes: Attributes) -> Self {
        Self(Arc::new(Mutex::new(RequestState {
            span: Some(span),
            duration_attributes,
        })))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, RequestState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the span current until the returned scope is dropped.
    pub(crate) fn enter(&self) -> SpanScope {
        self.lock()
            .span
            .as_ref()
            .map_or_else(SpanScope::none, |span| span.enter())
    }

    /// Ends the span unless it already ended.
    pub(crate) fn end_span(&self, status: Option<SpanStatus>) {
        let span = self.lock().span.take();
        if let Some(mut span) = span {
            if let Some(status) = status {
                span.set_status(status);
            }
            span.end();
        }
    }
}

/// Book-keeping for one in-flight request.
///
/// Creating it increments the active request counter; dropping it records
/// the request duration and decrements the counter with the same labels.
pub(crate) struct InFlight {
    metrics: Arc<dyn RequestMetrics>,
    started: Instant,
    active_attributes: Attributes,
    request: SharedRequest,
}

impl InFlight {
    pub(crate) fn start(
        metrics: Arc<dyn RequestMetrics>,
        active_attributes: Attributes,
        request: SharedRequest,
    ) -> Self {
        metrics.add_active_requests(1, &active_attributes);
        Self {
            metrics,
            started: Instant::now(),
            active_attributes,
            request,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        elapsed.round().max(0.0) as u64
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let elapsed = self.elapsed_ms();
        {
            let state = self.request.lock();
            self.metrics
                .record_duration(elapsed, &state.duration_attributes);
        }
        self.metrics
            .add_active_requests(-1, &self.active_attributes);
    }
}

/// Response body that finishes the request span once it is done.
pub struct TracedBody {
    inner: Option<BoxBody>,
    request: SharedRequest,
    in_flight: Option<InFlight>,
}

impl TracedBody {
    pub(crate) fn new(inner: BoxBody, request: SharedRequest, in_flight: InFlight) -> Self {
        Self {
            inner: Some(inner),
            request,
            in_flight: Some(in_flight),
        }
    }

    /// Whether the span has been ended.
    pub fn is_finished(&self) -> bool {
        self.in_flight.is_none()
    }

    fn finish(&mut self, status: Option<SpanStatus>) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
        self.request.end_span(status);
        self.in_flight.take();
    }
}

impl Iterator for TracedBody {
    type Item = Result<Bytes, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        let item = {
            let _scope = self.request.enter();
            inner.next()
        };

        match item {
            Some(Ok(chunk)) => Some(Ok(chunk)),
            Some(Err(err)) => {
                let recording = self
                    .request
                    .lock()
                    .span
                    .as_ref()
                    .is_some_and(|span| span.is_recording());
                self.finish(recording.then(|| SpanStatus::Error(err.to_string())));
                Some(Err(err))
            }
            None => {
                self.finish(None);
                None
            }
        }
    }
}

impl ResponseBody for TracedBody {
    fn close(&mut self) {
        self.finish(None);
    }
}

impl Drop for TracedBody {
    fn drop(&mut self) {
        self.finish(None);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
    use super::*;
    use crate::middleware::app::{chunks_body, iter_body};
    use crate::observability::span::{AttributeValue, SpanKind};

    #[derive(Default)]
    struct Counters {
        ended: AtomicUsize,
        active: AtomicI64,
        durations: AtomicUsize,
        status: Mutex<SpanStatus>,
    }

    struct CountingSpan(Arc<Counters>);

    impl RequestSpan for CountingSpan {
        fn is_recording(&self) -> bool {
            true
        }

        fn kind(&self) -> SpanKind {
            SpanKind::Server
        }

        fn set_attribute(&mut self, _key: &str, _value: AttributeValue) {}

        fn set_status(&mut self, status: SpanStatus) {
            *self.0.status.lock().unwrap() = status;
        }

        fn end(&mut self) {
            self.0.ended.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl RequestMetrics for Counters {
        fn record_duration(&self, _duration_ms: u64, _attributes: &Attributes) {
            self.durations.fetch_add(1, Ordering::SeqCst);
        }

        fn add_active_requests(&self, delta: i64, _attributes: &Attributes) {
            self.active.fetch_add(delta, Ordering::SeqCst);
        }
    }

    struct ClosableBody {
        closed: Arc<AtomicBool>,
        remaining: usize,
    }

    impl Iterator for ClosableBody {
        type Item = Result<Bytes, AppError>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Ok(Bytes::from_static(b"chunk")))
        }
    }

    impl ResponseBody for ClosableBody {
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn traced(inner: BoxBody) -> (TracedBody, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let request = SharedRequest::new(Box::new(CountingSpan(counters.clone())), Attributes::new());
        let in_flight = InFlight::start(counters.clone(), Attributes::new(), request.clone());
        assert_eq!(counters.active.load(Ordering::SeqCst), 1);
        let body = TracedBody::new(inner, request, in_flight);
        (body, counters)
    }

    #[test]
    fn test_exhaustion_finishes_once() {
        let (mut body, counters) = traced(chunks_body(["a", "b"]));

        assert_eq!(body.next().unwrap().unwrap(), Bytes::from("a"));
        assert_eq!(counters.ended.load(Ordering::SeqCst), 0);
        assert_eq!(body.next().unwrap().unwrap(), Bytes::from("b"));
        assert!(body.next().is_none());
        assert!(body.is_finished());

        body.close();
        assert!(body.next().is_none());
        drop(body);

        assert_eq!(counters.ended.load(Ordering::SeqCst), 1);
        assert_eq!(counters.durations.load(Ordering::SeqCst), 1);
        assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_early_drop_closes_inner_body() {
        let closed = Arc::new(AtomicBool::new(false));
        let (mut body, counters) = traced(Box::new(ClosableBody {
            closed: closed.clone(),
            remaining: 3,
        }));

        assert!(body.next().is_some());
        drop(body);

        assert!(closed.load(Ordering::SeqCst));
        assert_eq!(counters.ended.load(Ordering::SeqCst), 1);
        assert_eq!(counters.active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failing_chunk_marks_error_and_finishes() {
        let chunks: Vec<Result<Bytes, AppError>> =
            vec![Ok(Bytes::from("a")), Err("stream broke".into())];
        let (mut body, counters) = traced(iter_body(chunks));

        assert!(body.next().unwrap().is_ok());
        let err = body.next().unwrap().unwrap_err();
        assert_eq!(err.to_string(), "stream broke");
        assert!(body.is_finished());
        assert!(body.next().is_none());

        assert_eq!(
            *counters.status.lock().unwrap(),
            SpanStatus::Error("stream broke".into())
        );
        assert_eq!(counters.ended.load(Ordering::SeqCst), 1);
        assert_eq!(counters.durations.load(Ordering::SeqCst), 1);
    }
}
