//! Request metadata.
//!
//! # Responsibilities
//! - Hold the protocol-level facts of one request as CGI-style variables
//! - Expose request headers stored under the `HTTP_` prefix
//! - Build the variables from `http` crate request types
//!
//! # Design Decisions
//! - Keys are stored verbatim; header keys are upper-case with `_` separators
//! - `Content-Type` and `Content-Length` live under `CONTENT_TYPE` and
//!   `CONTENT_LENGTH`, without the header prefix

use std::collections::HashMap;
use std::net::SocketAddr;

pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
pub const SCRIPT_NAME: &str = "SCRIPT_NAME";
pub const PATH_INFO: &str = "PATH_INFO";
pub const QUERY_STRING: &str = "QUERY_STRING";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_PORT: &str = "SERVER_PORT";
pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
pub const URL_SCHEME: &str = "URL_SCHEME";
pub const RAW_URI: &str = "RAW_URI";
pub const REQUEST_URI: &str = "REQUEST_URI";
pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
pub const REMOTE_HOST: &str = "REMOTE_HOST";
pub const REMOTE_PORT: &str = "REMOTE_PORT";
pub const CONTENT_TYPE: &str = "CONTENT_TYPE";
pub const CONTENT_LENGTH: &str = "CONTENT_LENGTH";
pub const HTTP_HOST: &str = "HTTP_HOST";
pub const HTTP_USER_AGENT: &str = "HTTP_USER_AGENT";

/// Prefix of every request header variable.
pub const HEADER_PREFIX: &str = "HTTP_";

/// Variable name under which a request header is stored.
pub fn header_key(name: &str) -> String {
    format!(
        "{}{}",
        HEADER_PREFIX,
        name.to_ascii_uppercase().replace('-', "_")
    )
}

/// Read-only metadata of a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environ {
    vars: HashMap<String, String>,
}

impl Environ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// The value of `key` when present and non-empty.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Header variables with the prefix stripped, e.g. `("X_CUSTOM", "v")`.
    pub fn header_vars(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter_map(|(key, value)| key.strip_prefix(HEADER_PREFIX).map(|name| (name, value)))
    }

    /// Builds the metadata for `request` as received from `remote`.
    pub fn from_request<B>(request: &::http::Request<B>, remote: Option<SocketAddr>) -> Self {
        let uri = request.uri();
        let mut environ = Environ::new()
            .with(REQUEST_METHOD, request.method().as_str())
            .with(SCRIPT_NAME, "")
            .with(PATH_INFO, uri.path())
            .with(QUERY_STRING, uri.query().unwrap_or_default())
            .with(SERVER_PROTOCOL, format!("{:?}", request.version()))
            .with(URL_SCHEME, uri.scheme_str().unwrap_or("http"));

        if let Some(path_and_query) = uri.path_and_query() {
            environ.insert(REQUEST_URI, path_and_query.as_str());
        }

        let authority = request
            .headers()
            .get(::http::header::HOST)
            .and_then(|host| host.to_str().ok())
            .and_then(|host| host.parse::<::http::uri::Authority>().ok())
            .or_else(|| uri.authority().cloned());
        if let Some(authority) = authority {
            environ.insert(SERVER_NAME, authority.host());
            let port = authority.port_u16().unwrap_or_else(|| {
                if uri.scheme_str() == Some("https") {
                    443
                } else {
                    80
                }
            });
            environ.insert(SERVER_PORT, port.to_string());
        }

        for name in request.headers().keys() {
            let values: Vec<&str> = request
                .headers()
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect();
            if values.is_empty() {
                continue;
            }
            let key = if *name == ::http::header::CONTENT_TYPE {
                CONTENT_TYPE.to_string()
            } else if *name == ::http::header::CONTENT_LENGTH {
                CONTENT_LENGTH.to_string()
            } else {
                header_key(name.as_str())
            };
            environ.insert(key, values.join(","));
        }

        if let Some(remote) = remote {
            environ.insert(REMOTE_ADDR, remote.ip().to_string());
            environ.insert(REMOTE_PORT, remote.port().to_string());
        }

        environ
    }
}

impl<K, V> FromIterator<(K, V)> for Environ
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut environ = Environ::new();
        for (key, value) in iter {
            environ.insert(key, value);
        }
        environ
    }
}
