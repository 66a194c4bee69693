//! Request URL reconstruction.

use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::http::environ::{
    Environ, HTTP_HOST, PATH_INFO, QUERY_STRING, SCRIPT_NAME, SERVER_NAME, SERVER_PORT,
    URL_SCHEME,
};

/// Characters left as-is in path segments, besides ASCII alphanumerics.
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b';')
    .remove(b'=')
    .remove(b',')
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~');

/// Percent-encodes a path taken from request metadata.
///
/// Metadata values carry raw request bytes as code points up to U+00FF, so
/// those map back to single bytes. Anything wider is encoded as UTF-8.
fn quote_path(path: &str) -> String {
    let mut bytes = Vec::with_capacity(path.len());
    for c in path.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(byte) => bytes.push(byte),
            Err(_) => bytes.extend_from_slice(c.encode_utf8(&mut [0; 4]).as_bytes()),
        }
    }
    percent_encode(&bytes, PATH_SAFE).to_string()
}

/// Rebuilds the full request URL from scheme, host, script name, path and
/// query string.
///
/// The server port is appended only when it is not the scheme default.
/// Script name and path are percent-encoded.
pub fn request_uri(environ: &Environ) -> String {
    let scheme = environ.get(URL_SCHEME).unwrap_or("http");
    let mut url = format!("{}://", scheme);

    match environ.get_non_empty(HTTP_HOST) {
        Some(host) => url.push_str(host),
        None => {
            url.push_str(environ.get(SERVER_NAME).unwrap_or_default());
            let default_port = if scheme == "https" { "443" } else { "80" };
            if let Some(port) = environ.get_non_empty(SERVER_PORT) {
                if port != default_port {
                    url.push(':');
                    url.push_str(port);
                }
            }
        }
    }

    let path_info = environ.get(PATH_INFO).unwrap_or_default();
    match environ.get_non_empty(SCRIPT_NAME) {
        Some(script_name) => {
            url.push_str(&quote_path(script_name));
            url.push_str(&quote_path(path_info));
        }
        None => {
            url.push('/');
            url.push_str(&quote_path(path_info.strip_prefix('/').unwrap_or(path_info)));
        }
    }

    if let Some(query) = environ.get_non_empty(QUERY_STRING) {
        url.push('?');
        url.push_str(query);
    }
    url
}

/// Strips user name and password from `url`.
///
/// Unparsable input and URLs without credentials are returned unchanged.
pub fn remove_url_credentials(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if parsed.username().is_empty() && parsed.password().is_none() {
        return url.to_string();
    }
    // Both setters only fail for URLs that cannot carry credentials at all.
    if parsed.set_username("").is_err() || parsed.set_password(None).is_err() {
        return url.to_string();
    }
    parsed.into()
}
