//! Span and tracer abstractions used by the middleware.
//!
//! The middleware never talks to a tracing SDK directly. It starts spans
//! through a [`RequestTracer`] and annotates them through [`RequestSpan`], so
//! the SDK can be swapped at construction time.

use std::collections::BTreeMap;
use std::fmt;

use opentelemetry::propagation::Extractor;
use opentelemetry::{Array, ContextGuard, StringValue, Value};

pub use opentelemetry::trace::SpanKind;

/// Span attributes keyed by attribute name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    StringArray(Vec<String>),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::I64(v) => write!(f, "{}", v),
            AttributeValue::F64(v) => write!(f, "{}", v),
            AttributeValue::String(v) => f.write_str(v),
            AttributeValue::StringArray(values) => write!(f, "[{}]", values.join(", ")),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::I64(value)
    }
}

impl From<u16> for AttributeValue {
    fn from(value: u16) -> Self {
        AttributeValue::I64(i64::from(value))
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        AttributeValue::StringArray(values)
    }
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(v) => Value::Bool(v),
            AttributeValue::I64(v) => Value::I64(v),
            AttributeValue::F64(v) => Value::F64(v),
            AttributeValue::String(v) => Value::String(v.into()),
            AttributeValue::StringArray(values) => Value::Array(Array::String(
                values.into_iter().map(StringValue::from).collect(),
            )),
        }
    }
}

/// Outcome recorded on a span.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Ok,
    Error(String),
}

impl SpanStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, SpanStatus::Error(_))
    }
}

/// Keeps a span current until dropped.
///
/// Dropping the scope detaches the span's context again, so a scope must be
/// dropped on the thread that created it.
#[must_use = "the span is only current while the scope is alive"]
#[derive(Default)]
pub struct SpanScope {
    _guard: Option<ContextGuard>,
}

impl SpanScope {
    /// A scope that makes nothing current.
    pub fn none() -> Self {
        Self { _guard: None }
    }

    pub(crate) fn attached(guard: ContextGuard) -> Self {
        Self {
            _guard: Some(guard),
        }
    }
}

impl fmt::Debug for SpanScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpanScope")
            .field("attached", &self._guard.is_some())
            .finish()
    }
}

/// A span owned by exactly one request.
pub trait RequestSpan: Send {
    /// Whether attribute and status updates are kept.
    fn is_recording(&self) -> bool;

    fn kind(&self) -> SpanKind;

    fn set_attribute(&mut self, key: &str, value: AttributeValue);

    fn set_attributes(&mut self, attributes: Attributes) {
        for (key, value) in attributes {
            self.set_attribute(&key, value);
        }
    }

    fn set_status(&mut self, status: SpanStatus);

    /// Ends the span. Calls after the first are ignored by implementations.
    fn end(&mut self);

    /// Makes this span the current one until the returned scope drops.
    fn enter(&self) -> SpanScope {
        SpanScope::none()
    }
}

/// Starts request spans.
pub trait RequestTracer: Send + Sync {
    /// Starts a span for an inbound request.
    ///
    /// `carrier` exposes the request headers for upstream context extraction.
    fn start_span(
        &self,
        name: &str,
        attributes: &Attributes,
        carrier: &dyn Extractor,
    ) -> Box<dyn RequestSpan>;
}
