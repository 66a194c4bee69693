//! Response interception.
//!
//! [`InstrumentedStartResponse`] sits between the application and the
//! server's own [`StartResponse`]. Every call records the status and the
//! captured response headers on the request span before forwarding the call
//! unchanged. Servers may call it more than once (e.g. `100 Continue`); later
//! calls overwrite the status attribute, the span status and the status label.

use std::sync::Arc;

use crate::http::attributes::HeaderCapture;
use crate::http::environ::Environ;
use crate::http::status::{apply_response_attributes, parse_status_code, HTTP_STATUS_CODE};
use crate::middleware::app::{AppError, Responder, StartResponse};
use crate::middleware::body::{RequestState, SharedRequest};
use crate::observability::span::{AttributeValue, RequestSpan, SpanKind};

/// Called after the span is started, before the application runs.
pub type RequestHook = dyn Fn(&mut dyn RequestSpan, &Environ) + Send + Sync;

/// Called on every response start with the status line and headers.
pub type ResponseHook = dyn Fn(&mut dyn RequestSpan, &Environ, &str, &[(String, String)]) + Send + Sync;

/// [`StartResponse`] wrapper that annotates the request span.
///
/// It owns its share of the request state, so applications may keep it (as
/// a [`Responder`]) inside their response body. Calls made after the span
/// has ended are only forwarded.
pub(crate) struct InstrumentedStartResponse {
    request: SharedRequest,
    inner: Responder,
    environ: Arc<Environ>,
    capture: Arc<HeaderCapture>,
    response_hook: Option<Arc<ResponseHook>>,
}

impl InstrumentedStartResponse {
    pub(crate) fn new(
        request: SharedRequest,
        inner: Responder,
        environ: Arc<Environ>,
        capture: Arc<HeaderCapture>,
    ) -> Self {
        Self {
            request,
            inner,
            environ,
            capture,
            response_hook: None,
        }
    }

    pub(crate) fn with_response_hook(mut self, hook: Option<Arc<ResponseHook>>) -> Self {
        self.response_hook = hook;
        self
    }
}

impl StartResponse for InstrumentedStartResponse {
    fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<&AppError>,
    ) -> Result<(), AppError> {
        {
            let mut state = self.request.lock();
            let RequestState {
                span,
                duration_attributes,
            } = &mut *state;

            if let Some(span) = span.as_mut() {
                apply_response_attributes(&mut **span, status);
            }

            if let Some(code) = parse_status_code(status) {
                duration_attributes.insert(HTTP_STATUS_CODE.to_string(), AttributeValue::from(code));
            }

            if let Some(span) = span.as_mut() {
                if span.is_recording() && span.kind() == SpanKind::Server {
                    let attributes = self.capture.response_header_attributes(headers);
                    if !attributes.is_empty() {
                        span.set_attributes(attributes);
                    }
                }

                if let Some(hook) = &self.response_hook {
                    hook(&mut **span, &self.environ, status, headers);
                }
            }
        }

        self.inner.start_response(status, headers, exc_info)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::config::CaptureConfig;
    use crate::observability::span::{Attributes, SpanStatus};

    #[derive(Default)]
    struct Seen {
        attributes: Attributes,
        status: SpanStatus,
    }

    struct FakeSpan {
        recording: bool,
        seen: Arc<Mutex<Seen>>,
    }

    impl RequestSpan for FakeSpan {
        fn is_recording(&self) -> bool {
            self.recording
        }

        fn kind(&self) -> SpanKind {
            SpanKind::Server
        }

        fn set_attribute(&mut self, key: &str, value: AttributeValue) {
            self.seen
                .lock()
                .unwrap()
                .attributes
                .insert(key.to_string(), value);
        }

        fn set_status(&mut self, status: SpanStatus) {
            self.seen.lock().unwrap().status = status;
        }

        fn end(&mut self) {}
    }

    type Forwarded = Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>;

    fn server() -> (Responder, Forwarded) {
        let forwarded = Forwarded::default();
        let calls = Arc::clone(&forwarded);
        let responder = Responder::new(
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
        );
        (responder, forwarded)
    }

    fn request(recording: bool) -> (SharedRequest, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        let span = FakeSpan {
            recording,
            seen: Arc::clone(&seen),
        };
        (SharedRequest::new(Box::new(span), Attributes::new()), seen)
    }

    fn capture() -> Arc<HeaderCapture> {
        Arc::new(HeaderCapture::new(&CaptureConfig {
            server_response: vec!["content-type".into()],
            ..Default::default()
        }))
    }

    #[test]
    fn test_records_status_and_headers_then_forwards() {
        let (request, seen) = request(true);
        let (inner, forwarded) = server();
        let mut instrumented = InstrumentedStartResponse::new(
            request.clone(),
            inner,
            Arc::new(Environ::new()),
            capture(),
        );

        let headers = vec![("Content-Type".to_string(), "text/html".to_string())];
        instrumented
            .start_response("503 Service Unavailable", &headers, None)
            .unwrap();

        assert_eq!(
            *forwarded.lock().unwrap(),
            vec![("503 Service Unavailable".to_string(), headers)]
        );
        assert_eq!(
            request.lock().duration_attributes[HTTP_STATUS_CODE],
            AttributeValue::I64(503)
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.attributes[HTTP_STATUS_CODE], AttributeValue::I64(503));
        assert_eq!(
            seen.attributes["http.response.header.content_type"],
            AttributeValue::StringArray(vec!["text/html".into()])
        );
        assert!(seen.status.is_error());
    }

    #[test]
    fn test_invalid_status_marks_error_without_label() {
        let (request, seen) = request(true);
        let (inner, _) = server();
        InstrumentedStartResponse::new(request.clone(), inner, Arc::new(Environ::new()), capture())
            .start_response("bad status", &[], None)
            .unwrap();

        assert!(request.lock().duration_attributes.is_empty());
        let seen = seen.lock().unwrap();
        assert!(!seen.attributes.contains_key(HTTP_STATUS_CODE));
        assert_eq!(
            seen.status,
            SpanStatus::Error("Non-integer HTTP status: \"bad\"".into())
        );
    }

    #[test]
    fn test_out_of_range_status_is_recorded_as_error() {
        let (request, seen) = request(true);
        let (inner, _) = server();
        InstrumentedStartResponse::new(request.clone(), inner, Arc::new(Environ::new()), capture())
            .start_response("-1 Negative", &[], None)
            .unwrap();

        assert_eq!(
            request.lock().duration_attributes[HTTP_STATUS_CODE],
            AttributeValue::I64(-1)
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.attributes[HTTP_STATUS_CODE], AttributeValue::I64(-1));
        assert!(seen.status.is_error());
    }

    #[test]
    fn test_not_recording_skips_attributes_but_runs_hook() {
        let (request, seen) = request(false);
        let (inner, _) = server();
        let hook: Arc<ResponseHook> = Arc::new(
            |span: &mut dyn RequestSpan, environ: &Environ, status: &str, _: &[(String, String)]| {
                span.set_attribute(
                    "hook.path",
                    environ.get("PATH_INFO").unwrap_or_default().into(),
                );
                span.set_attribute("hook.status", status.into());
            },
        );

        InstrumentedStartResponse::new(
            request.clone(),
            inner,
            Arc::new(Environ::new().with("PATH_INFO", "/hooked")),
            capture(),
        )
        .with_response_hook(Some(hook))
        .start_response(
            "200 OK",
            &[("Content-Type".into(), "text/plain".into())],
            None,
        )
        .unwrap();

        assert_eq!(
            request.lock().duration_attributes[HTTP_STATUS_CODE],
            AttributeValue::I64(200)
        );
        let seen = seen.lock().unwrap();
        assert_eq!(seen.attributes.len(), 2);
        assert_eq!(seen.attributes["hook.path"], AttributeValue::from("/hooked"));
        assert_eq!(seen.attributes["hook.status"], AttributeValue::from("200 OK"));
    }

    #[test]
    fn test_after_span_ended_only_forwards() {
        let (request, seen) = request(true);
        let (inner, forwarded) = server();
        let mut instrumented = InstrumentedStartResponse::new(
            request.clone(),
            inner,
            Arc::new(Environ::new()),
            capture(),
        );

        request.end_span(None);
        instrumented.start_response("500 Internal Server Error", &[], None).unwrap();

        assert_eq!(forwarded.lock().unwrap().len(), 1);
        let seen = seen.lock().unwrap();
        assert!(seen.attributes.is_empty());
        assert_eq!(seen.status, SpanStatus::Unset);
    }
}
