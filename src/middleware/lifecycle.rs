//! Request span lifecycle.
//!
//! # Request Flow
//! ```text
//! handle(environ, start_response)
//!     → collect request attributes, project metric labels
//!     → start span (upstream context from the request headers)
//!     → captured request headers, request hook
//!     → active requests +1, start timer
//!     → application, with an instrumented start_response
//!         → Err: span error, span end, metrics settled, error returned
//!         → Ok: TracedBody holds the request until the body is finished;
//!           the body may still start the response
//! ```

use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::headers::EnvironGetter;
use crate::http::attributes::{
    active_request_attributes, collect_request_attributes, default_span_name, duration_attributes,
    HeaderCapture,
};
use crate::http::environ::Environ;
use crate::middleware::app::{AppError, Application, BoxBody, Responder};
use crate::middleware::body::{InFlight, SharedRequest, TracedBody};
use crate::middleware::response::{InstrumentedStartResponse, RequestHook, ResponseHook};
use crate::observability::metrics::{MetricsRecorder, RequestMetrics};
use crate::observability::otel::OtelTracer;
use crate::observability::span::{RequestSpan, RequestTracer, SpanKind, SpanStatus};

/// Wraps an [`Application`] so that every request is traced and measured.
pub struct TraceMiddleware<A> {
    app: A,
    tracer: Arc<dyn RequestTracer>,
    metrics: Arc<dyn RequestMetrics>,
    capture: Arc<HeaderCapture>,
    request_hook: Option<Box<RequestHook>>,
    response_hook: Option<Arc<ResponseHook>>,
}

impl<A: Application> TraceMiddleware<A> {
    /// Wraps `app` with the global tracer, the `metrics` recorder and
    /// capture settings from the process environment.
    pub fn new(app: A) -> Self {
        Self::builder(app).build()
    }

    pub fn builder(app: A) -> TraceMiddlewareBuilder<A> {
        TraceMiddlewareBuilder {
            app,
            tracer: None,
            metrics: None,
            config: None,
            request_hook: None,
            response_hook: None,
        }
    }

    /// Runs one request through the wrapped application.
    ///
    /// Application errors are returned unchanged after the span has been
    /// marked failed and ended. On success the returned body must be drained,
    /// closed or dropped to end the span.
    pub fn handle(
        &self,
        environ: &Environ,
        start_response: Responder,
    ) -> Result<TracedBody, AppError> {
        let capture_all_methods = self.capture.capture_all_methods();
        let request_attributes = collect_request_attributes(environ, capture_all_methods);
        let active_attributes = active_request_attributes(&request_attributes);
        let request_duration_attributes = duration_attributes(&request_attributes);

        let span_name = default_span_name(environ, capture_all_methods);
        let mut span = self.tracer.start_span(
            &span_name,
            &request_attributes,
            &EnvironGetter::new(environ),
        );

        if span.is_recording() && span.kind() == SpanKind::Server {
            let headers = self.capture.request_header_attributes(environ);
            if !headers.is_empty() {
                span.set_attributes(headers);
            }
        }

        if let Some(hook) = &self.request_hook {
            hook(span.as_mut(), environ);
        }

        let request = SharedRequest::new(span, request_duration_attributes);
        let in_flight = InFlight::start(
            Arc::clone(&self.metrics),
            active_attributes,
            request.clone(),
        );

        let instrumented = InstrumentedStartResponse::new(
            request.clone(),
            start_response,
            Arc::new(environ.clone()),
            Arc::clone(&self.capture),
        )
        .with_response_hook(self.response_hook.clone());

        let result = {
            let _scope = request.enter();
            self.app.call(environ, Responder::new(instrumented))
        };

        match result {
            Ok(body) => Ok(TracedBody::new(body, request, in_flight)),
            Err(err) => {
                tracing::debug!(span = %span_name, error = %err, "application failed");
                request.end_span(Some(SpanStatus::Error(err.to_string())));
                drop(in_flight);
                Err(err)
            }
        }
    }
}

impl<A: Application> Application for TraceMiddleware<A> {
    fn call(
        &self,
        environ: &Environ,
        start_response: Responder,
    ) -> Result<BoxBody, AppError> {
        let body = self.handle(environ, start_response)?;
        Ok(Box::new(body))
    }
}

/// Builder for [`TraceMiddleware`].
pub struct TraceMiddlewareBuilder<A> {
    app: A,
    tracer: Option<Arc<dyn RequestTracer>>,
    metrics: Option<Arc<dyn RequestMetrics>>,
    config: Option<CaptureConfig>,
    request_hook: Option<Box<RequestHook>>,
    response_hook: Option<Arc<ResponseHook>>,
}

impl<A: Application> TraceMiddlewareBuilder<A> {
    pub fn tracer(mut self, tracer: impl RequestTracer + 'static) -> Self {
        self.tracer = Some(Arc::new(tracer));
        self
    }

    pub fn metrics(mut self, metrics: impl RequestMetrics + 'static) -> Self {
        self.metrics = Some(Arc::new(metrics));
        self
    }

    /// Header capture settings. Defaults to [`CaptureConfig::from_env`].
    pub fn config(mut self, config: CaptureConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn request_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn RequestSpan, &Environ) + Send + Sync + 'static,
    {
        self.request_hook = Some(Box::new(hook));
        self
    }

    pub fn response_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn RequestSpan, &Environ, &str, &[(String, String)]) + Send + Sync + 'static,
    {
        self.response_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> TraceMiddleware<A> {
        let config = self.config.unwrap_or_else(CaptureConfig::from_env);
        TraceMiddleware {
            app: self.app,
            tracer: self
                .tracer
                .unwrap_or_else(|| Arc::new(OtelTracer::global())),
            metrics: self
                .metrics
                .unwrap_or_else(|| Arc::new(MetricsRecorder::new())),
            capture: Arc::new(HeaderCapture::new(&config)),
            request_hook: self.request_hook,
            response_hook: self.response_hook,
        }
    }
}
