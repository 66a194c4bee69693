//! Span attribute collection.
//!
//! # Responsibilities
//! - Derive the semantic-convention attributes of a request from its metadata
//! - Capture configured request and response headers as attributes
//! - Project the attribute subsets used as metric labels
//!
//! # Design Decisions
//! - Every function here is total: malformed input drops the attribute
//! - Header patterns are compiled once per middleware, not per request

use crate::config::CaptureConfig;
use crate::headers::{
    normalize_request_header_name, normalize_response_header_name, HeaderNameMatcher, HeaderSet,
    SanitizeValue,
};
use crate::http::environ::{
    Environ, HTTP_HOST, HTTP_USER_AGENT, PATH_INFO, RAW_URI, REMOTE_ADDR, REMOTE_HOST,
    REMOTE_PORT, REQUEST_METHOD, REQUEST_URI, SERVER_NAME, SERVER_PORT, SERVER_PROTOCOL,
    URL_SCHEME,
};
use crate::http::method::sanitize_method;
use crate::http::status::HTTP_STATUS_CODE;
use crate::http::uri::{remove_url_credentials, request_uri};
use crate::observability::span::{AttributeValue, Attributes};

pub const HTTP_METHOD: &str = "http.method";
pub const HTTP_SERVER_NAME: &str = "http.server_name";
pub const HTTP_SCHEME: &str = "http.scheme";
pub const HTTP_HOST_ATTR: &str = "http.host";
pub const HTTP_TARGET: &str = "http.target";
pub const HTTP_URL: &str = "http.url";
pub const HTTP_USER_AGENT_ATTR: &str = "http.user_agent";
pub const HTTP_FLAVOR: &str = "http.flavor";
pub const NET_HOST_NAME: &str = "net.host.name";
pub const NET_HOST_PORT: &str = "net.host.port";
pub const NET_PEER_IP: &str = "net.peer.ip";
pub const NET_PEER_NAME: &str = "net.peer.name";
pub const NET_PEER_PORT: &str = "net.peer.port";

const HTTP_VERSION_PREFIX: &str = "HTTP/";

/// Attribute keys copied into duration histogram labels.
pub const DURATION_ATTRIBUTES: &[&str] = &[
    HTTP_METHOD,
    HTTP_HOST_ATTR,
    HTTP_SCHEME,
    HTTP_STATUS_CODE,
    HTTP_FLAVOR,
    HTTP_SERVER_NAME,
    NET_HOST_NAME,
    NET_HOST_PORT,
];

/// Attribute keys copied into active request counter labels.
pub const ACTIVE_REQUESTS_ATTRIBUTES: &[&str] = &[
    HTTP_METHOD,
    HTTP_HOST_ATTR,
    HTTP_SCHEME,
    HTTP_FLAVOR,
    HTTP_SERVER_NAME,
];

/// Compiled header capture settings.
#[derive(Debug, Clone, Default)]
pub struct HeaderCapture {
    request: HeaderNameMatcher,
    response: HeaderNameMatcher,
    sanitize: SanitizeValue,
    capture_all_methods: bool,
}

impl HeaderCapture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            request: HeaderNameMatcher::new(&config.server_request),
            response: HeaderNameMatcher::new(&config.server_response),
            sanitize: SanitizeValue::new(HeaderNameMatcher::new(&config.sanitize_fields)),
            capture_all_methods: config.capture_all_methods,
        }
    }

    pub fn capture_all_methods(&self) -> bool {
        self.capture_all_methods
    }

    /// Attributes for the configured request headers found in `environ`.
    pub fn request_header_attributes(&self, environ: &Environ) -> Attributes {
        if self.request.is_empty() {
            return Attributes::new();
        }
        let headers = HeaderSet::from_pairs(
            environ
                .header_vars()
                .map(|(name, value)| (name.replace('_', "-"), value)),
        );
        self.sanitize
            .sanitize_header_values(&headers, &self.request, normalize_request_header_name)
    }

    /// Attributes for the configured headers in a response header list.
    pub fn response_header_attributes(&self, headers: &[(String, String)]) -> Attributes {
        if self.response.is_empty() || headers.is_empty() {
            return Attributes::new();
        }
        let headers = HeaderSet::from_pairs(
            headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        );
        self.sanitize
            .sanitize_header_values(&headers, &self.response, normalize_response_header_name)
    }
}

fn set_if_some(attributes: &mut Attributes, key: &str, value: Option<impl Into<AttributeValue>>) {
    if let Some(value) = value {
        attributes.insert(key.to_string(), value.into());
    }
}

/// Semantic-convention attributes of the request described by `environ`.
pub fn collect_request_attributes(environ: &Environ, capture_all_methods: bool) -> Attributes {
    let mut attributes = Attributes::new();

    set_if_some(
        &mut attributes,
        HTTP_METHOD,
        environ
            .get(REQUEST_METHOD)
            .map(|method| sanitize_method(method, capture_all_methods)),
    );
    set_if_some(&mut attributes, HTTP_SERVER_NAME, environ.get(SERVER_NAME));
    set_if_some(&mut attributes, HTTP_SCHEME, environ.get(URL_SCHEME));

    set_if_some(
        &mut attributes,
        NET_HOST_PORT,
        environ
            .get_non_empty(SERVER_PORT)
            .and_then(|port| port.trim().parse::<i64>().ok()),
    );
    set_if_some(&mut attributes, HTTP_HOST_ATTR, environ.get(HTTP_HOST));

    match environ.get(RAW_URI).or_else(|| environ.get(REQUEST_URI)) {
        Some(target) => {
            attributes.insert(HTTP_TARGET.to_string(), target.into());
        }
        None => {
            let url = remove_url_credentials(&request_uri(environ));
            attributes.insert(HTTP_URL.to_string(), url.into());
        }
    }

    let remote_addr = environ.get_non_empty(REMOTE_ADDR);
    set_if_some(&mut attributes, NET_PEER_IP, remote_addr);
    set_if_some(
        &mut attributes,
        NET_PEER_NAME,
        environ
            .get_non_empty(REMOTE_HOST)
            .filter(|host| Some(*host) != remote_addr),
    );
    set_if_some(
        &mut attributes,
        HTTP_USER_AGENT_ATTR,
        environ.get_non_empty(HTTP_USER_AGENT),
    );
    set_if_some(
        &mut attributes,
        NET_PEER_PORT,
        environ
            .get_non_empty(REMOTE_PORT)
            .and_then(|port| port.trim().parse::<i64>().ok()),
    );

    let protocol = environ.get(SERVER_PROTOCOL).unwrap_or_default();
    let flavor = match protocol.get(..HTTP_VERSION_PREFIX.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(HTTP_VERSION_PREFIX) => {
            &protocol[HTTP_VERSION_PREFIX.len()..]
        }
        _ => protocol,
    };
    set_if_some(
        &mut attributes,
        HTTP_FLAVOR,
        Some(flavor).filter(|flavor| !flavor.is_empty()),
    );

    attributes
}

fn project(attributes: &Attributes, keys: &[&str]) -> Attributes {
    keys.iter()
        .filter_map(|key| {
            attributes
                .get(*key)
                .map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

/// Labels for the active request counter.
pub fn active_request_attributes(attributes: &Attributes) -> Attributes {
    project(attributes, ACTIVE_REQUESTS_ATTRIBUTES)
}

/// Labels for the duration histogram.
pub fn duration_attributes(attributes: &Attributes) -> Attributes {
    project(attributes, DURATION_ATTRIBUTES)
}

/// Span name: the method and path, or the method alone when there is no path.
pub fn default_span_name(environ: &Environ, capture_all_methods: bool) -> String {
    let method = sanitize_method(
        environ.get(REQUEST_METHOD).unwrap_or_default().trim(),
        capture_all_methods,
    );
    let path = environ.get(PATH_INFO).unwrap_or_default().trim();
    if path.is_empty() {
        method
    } else {
        format!("{} {}", method, path)
    }
}
