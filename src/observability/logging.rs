//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the logging subsystem
//! - Report request spans as log events when no tracing SDK is wired up
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via `RUST_LOG`, falling back to a caller default

use opentelemetry::propagation::Extractor;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::observability::span::{
    AttributeValue, Attributes, RequestSpan, RequestTracer, SpanKind, SpanStatus,
};

const TRACING_TARGET: &str = "environ_trace::span";

/// Installs the global tracing subscriber.
///
/// `default_directive` is used when `RUST_LOG` is unset or invalid.
pub fn init_logging(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// [`RequestTracer`] that writes every span to the log when it ends.
///
/// Spans are always recording and always SERVER spans; upstream context is
/// not extracted.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTracer;

impl RequestTracer for LogTracer {
    fn start_span(
        &self,
        name: &str,
        attributes: &Attributes,
        _carrier: &dyn Extractor,
    ) -> Box<dyn RequestSpan> {
        tracing::debug!(target: TRACING_TARGET, span = name, "span started");
        Box::new(LogSpan {
            name: name.to_string(),
            attributes: attributes.clone(),
            status: SpanStatus::Unset,
            ended: false,
        })
    }
}

/// Span buffered in memory until it is ended.
#[derive(Debug)]
pub struct LogSpan {
    name: String,
    attributes: Attributes,
    status: SpanStatus,
    ended: bool,
}

impl LogSpan {
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn render_attributes(&self) -> String {
        self.attributes
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl RequestSpan for LogSpan {
    fn is_recording(&self) -> bool {
        !self.ended
    }

    fn kind(&self) -> SpanKind {
        SpanKind::Server
    }

    fn set_attribute(&mut self, key: &str, value: AttributeValue) {
        if !self.ended {
            self.attributes.insert(key.to_string(), value);
        }
    }

    fn set_status(&mut self, status: SpanStatus) {
        if !self.ended {
            self.status = status;
        }
    }

    fn end(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let attributes = self.render_attributes();
        match &self.status {
            SpanStatus::Error(description) => tracing::warn!(
                target: TRACING_TARGET,
                span = %self.name,
                error = %description,
                %attributes,
                "span ended with error"
            ),
            _ => tracing::info!(
                target: TRACING_TARGET,
                span = %self.name,
                %attributes,
                "span ended"
            ),
        }
    }
}
