//! Application contract.
//!
//! An [`Application`] receives the request metadata and a [`Responder`]
//! wrapping the server's [`StartResponse`] callback. It returns the body as a
//! finite, non-restartable sequence of chunks. The response may be started
//! before returning or later, from the body, before its first chunk.

use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::http::Environ;

/// Error raised by an application or its response body.
pub type AppError = Box<dyn Error + Send + Sync>;

/// Response headers as `(name, value)` pairs.
pub type HeaderList = Vec<(String, String)>;

/// Boxed response body.
pub type BoxBody = Box<dyn ResponseBody>;

/// Callback that begins a response.
pub trait StartResponse {
    /// Begins the response with `status` (e.g. `"200 OK"`) and `headers`.
    ///
    /// `exc_info` carries the error when an application replaces a response
    /// after a failure.
    fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<&AppError>,
    ) -> Result<(), AppError>;
}

impl<F> StartResponse for F
where
    F: FnMut(&str, &[(String, String)], Option<&AppError>) -> Result<(), AppError>,
{
    fn start_response(
        &mut self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<&AppError>,
    ) -> Result<(), AppError> {
        self(status, headers, exc_info)
    }
}

/// Cloneable, owned handle to a [`StartResponse`] callback.
///
/// Applications receive it by value and may move it into their response body.
#[derive(Clone)]
pub struct Responder {
    inner: Arc<Mutex<dyn StartResponse + Send>>,
}

impl Responder {
    pub fn new(start_response: impl StartResponse + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(start_response)),
        }
    }

    /// Begins the response, see [`StartResponse::start_response`].
    pub fn start_response(
        &self,
        status: &str,
        headers: &[(String, String)],
        exc_info: Option<&AppError>,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.start_response(status, headers, exc_info)
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder").finish_non_exhaustive()
    }
}

/// A lazily produced response body.
///
/// Consumers must call [`ResponseBody::close`] (or drop the body) when they
/// stop iterating, whether or not the body was exhausted.
pub trait ResponseBody: Iterator<Item = Result<Bytes, AppError>> + Send {
    /// Releases resources held by the body.
    fn close(&mut self) {}
}

/// The request-handling callable being wrapped.
pub trait Application: Send + Sync {
    fn call(
        &self,
        environ: &Environ,
        start_response: Responder,
    ) -> Result<BoxBody, AppError>;
}

/// [`Application`] built from a closure, see [`app_fn`].
#[derive(Debug, Clone, Copy)]
pub struct AppFn<F> {
    f: F,
}

/// Wraps a closure as an [`Application`].
pub fn app_fn<F>(f: F) -> AppFn<F>
where
    F: Fn(&Environ, Responder) -> Result<BoxBody, AppError> + Send + Sync,
{
    AppFn { f }
}

impl<F> Application for AppFn<F>
where
    F: Fn(&Environ, Responder) -> Result<BoxBody, AppError> + Send + Sync,
{
    fn call(
        &self,
        environ: &Environ,
        start_response: Responder,
    ) -> Result<BoxBody, AppError> {
        (self.f)(environ, start_response)
    }
}

/// Body backed by any iterator of chunks.
#[derive(Debug)]
pub struct IterBody<I> {
    iter: I,
}

impl<I> Iterator for IterBody<I>
where
    I: Iterator<Item = Result<Bytes, AppError>>,
{
    type Item = Result<Bytes, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

impl<I> ResponseBody for IterBody<I> where I: Iterator<Item = Result<Bytes, AppError>> + Send {}

/// Body yielding the chunks produced by `iter`.
pub fn iter_body<I>(iter: I) -> BoxBody
where
    I: IntoIterator<Item = Result<Bytes, AppError>>,
    I::IntoIter: Send + 'static,
{
    Box::new(IterBody {
        iter: iter.into_iter(),
    })
}

/// Body yielding `chunks` in order.
pub fn chunks_body<I, B>(chunks: I) -> BoxBody
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let chunks: Vec<Result<Bytes, AppError>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
    iter_body(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_fn_forwards_call() {
        let app = app_fn(|environ: &Environ, start_response: Responder| {
            let status = if environ.get("PATH_INFO") == Some("/") {
                "200 OK"
            } else {
                "404 Not Found"
            };
            start_response.start_response(status, &[], None)?;
            Ok(chunks_body(["hello"]))
        });

        let seen = Arc::new(Mutex::new(Vec::new()));
        let server_seen = Arc::clone(&seen);
        let start = move |status: &str,
                          _: &[(String, String)],
                          _: Option<&AppError>|
              -> Result<(), AppError> {
            server_seen.lock().unwrap().push(status.to_string());
            Ok(())
        };
        let environ = Environ::new().with("PATH_INFO", "/");
        let body = app.call(&environ, Responder::new(start)).unwrap();

        let chunks: Vec<Bytes> = body.map(Result::unwrap).collect();
        assert_eq!(chunks, vec![Bytes::from("hello")]);
        assert_eq!(*seen.lock().unwrap(), vec!["200 OK"]);
    }

    #[test]
    fn test_responder_clones_share_callback() {
        let count = Arc::new(Mutex::new(0));
        let server_count = Arc::clone(&count);
        let responder = Responder::new(
            move |_: &str, _: &[(String, String)], _: Option<&AppError>| -> Result<(), AppError> {
                *server_count.lock().unwrap() += 1;
                Ok(())
            },
        );

        let body_responder = responder.clone();
        responder.start_response("100 Continue", &[], None).unwrap();
        body_responder.start_response("200 OK", &[], None).unwrap();
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
