//! OpenTelemetry-backed tracer.
//!
//! Spans are started through any [`opentelemetry::trace::Tracer`]. When no
//! span is active on the calling thread the upstream context is extracted from
//! the request carrier and a SERVER span is started as its child; otherwise
//! the request is traced as an INTERNAL child of the active span.

use std::sync::Arc;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{Span, SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

use crate::observability::span::{
    AttributeValue, Attributes, RequestSpan, RequestTracer, SpanScope, SpanStatus,
};

/// Instrumentation scope name reported to the tracer provider.
pub const INSTRUMENTATION_NAME: &str = "environ-trace";

/// [`RequestTracer`] on top of an OpenTelemetry tracer.
pub struct OtelTracer<T = BoxedTracer> {
    tracer: T,
    propagator: Option<Arc<dyn TextMapPropagator + Send + Sync>>,
}

impl OtelTracer<BoxedTracer> {
    /// Uses the globally registered tracer provider and propagator.
    pub fn global() -> Self {
        Self::new(global::tracer(INSTRUMENTATION_NAME))
    }
}

impl<T> OtelTracer<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            propagator: None,
        }
    }

    /// Extracts upstream context with `propagator` instead of the global one.
    pub fn with_propagator(mut self, propagator: impl TextMapPropagator + Send + Sync + 'static) -> Self {
        self.propagator = Some(Arc::new(propagator));
        self
    }

    fn extract(&self, carrier: &dyn Extractor) -> Context {
        match &self.propagator {
            Some(propagator) => propagator.extract(carrier),
            None => global::get_text_map_propagator(|propagator| propagator.extract(carrier)),
        }
    }
}

impl<T> RequestTracer for OtelTracer<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn start_span(
        &self,
        name: &str,
        attributes: &Attributes,
        carrier: &dyn Extractor,
    ) -> Box<dyn RequestSpan> {
        let current = Context::current();
        let (parent, kind) = if current.span().span_context().is_valid() {
            (current, SpanKind::Internal)
        } else {
            (self.extract(carrier), SpanKind::Server)
        };

        let span = self
            .tracer
            .span_builder(name.to_string())
            .with_kind(kind.clone())
            .with_attributes(
                attributes
                    .iter()
                    .map(|(key, value)| KeyValue::new(key.clone(), value.clone())),
            )
            .start_with_context(&self.tracer, &parent);

        Box::new(OtelSpan {
            cx: parent.with_span(span),
            kind,
        })
    }
}

/// A started OpenTelemetry span together with the context that carries it.
struct OtelSpan {
    cx: Context,
    kind: SpanKind,
}

impl RequestSpan for OtelSpan {
    fn is_recording(&self) -> bool {
        self.cx.span().is_recording()
    }

    fn kind(&self) -> SpanKind {
        self.kind.clone()
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        self.cx.span().set_attribute(KeyValue::new(key.to_string(), value));
    }

    fn set_status(&mut self, status: SpanStatus) {
        let status = match status {
            SpanStatus::Unset => Status::Unset,
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error(description) => Status::error(description),
        };
        self.cx.span().set_status(status);
    }

    fn end(&mut self) {
        self.cx.span().end();
    }

    fn enter(&self) -> SpanScope {
        SpanScope::attached(self.cx.clone().attach())
    }
}
