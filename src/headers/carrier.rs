//! Trace context propagation carriers.
//!
//! [`EnvironGetter`] lets an OpenTelemetry propagator read request headers
//! out of [`Environ`]; [`ResponsePropagationSetter`] lets it write into an
//! outgoing response header list.

use opentelemetry::propagation::{Extractor, Injector};
use opentelemetry::{global, Context};

use crate::http::environ::{header_key, Environ, HEADER_PREFIX};

/// Reads headers from request metadata for context extraction.
#[derive(Debug)]
pub struct EnvironGetter<'a> {
    environ: &'a Environ,
    keys: Vec<String>,
}

impl<'a> EnvironGetter<'a> {
    pub fn new(environ: &'a Environ) -> Self {
        let keys = environ
            .iter()
            .filter_map(|(key, _)| key.strip_prefix(HEADER_PREFIX))
            .map(|name| name.to_ascii_lowercase().replace('_', "-"))
            .collect();
        Self { environ, keys }
    }

    /// All values of header `key`, as a single-element list when present.
    pub fn get_values(&self, key: &str) -> Option<Vec<&'a str>> {
        self.environ.get(&header_key(key)).map(|value| vec![value])
    }
}

impl Extractor for EnvironGetter<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.environ.get(&header_key(key))
    }

    /// Header names present in the metadata, lower-case and hyphenated.
    fn keys(&self) -> Vec<&str> {
        self.keys.iter().map(String::as_str).collect()
    }
}

/// Appends propagation headers to an outgoing response header list.
#[derive(Debug)]
pub struct ResponsePropagationSetter<'a> {
    headers: &'a mut Vec<(String, String)>,
}

impl<'a> ResponsePropagationSetter<'a> {
    pub fn new(headers: &'a mut Vec<(String, String)>) -> Self {
        Self { headers }
    }
}

impl Injector for ResponsePropagationSetter<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.push((key.to_string(), value));
    }
}

/// Injects `cx` into `headers` with the global text-map propagator.
pub fn inject_response_context(cx: &Context, headers: &mut Vec<(String, String)>) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(cx, &mut ResponsePropagationSetter::new(headers))
    });
}
