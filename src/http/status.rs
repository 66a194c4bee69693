//! Response status handling.

use crate::observability::span::{AttributeValue, RequestSpan, SpanStatus};

pub const HTTP_STATUS_CODE: &str = "http.status_code";

/// Parses the numeric code from a status line such as `"200 OK"`.
pub fn parse_status_code(status: &str) -> Option<i64> {
    status_token(status).parse().ok()
}

fn status_token(status: &str) -> &str {
    status.split_once(' ').map_or(status, |(code, _)| code)
}

/// Maps an HTTP status code to a span outcome.
///
/// Codes below 100 are always errors. For server spans 4xx responses are the
/// caller's fault and stay unset; client spans treat them as errors.
pub fn http_status_to_status(code: i64, server_span: bool) -> SpanStatus {
    match code {
        i64::MIN..=99 => SpanStatus::Error(String::new()),
        100..=399 => SpanStatus::Unset,
        400..=499 if server_span => SpanStatus::Unset,
        _ => SpanStatus::Error(String::new()),
    }
}

/// Records the response status on `span`.
///
/// A non-numeric status marks the span as failed with the offending text.
pub fn apply_response_attributes(span: &mut dyn RequestSpan, status: &str) {
    if !span.is_recording() {
        return;
    }

    let token = status_token(status);
    match token.parse::<i64>() {
        Ok(code) => {
            span.set_attribute(HTTP_STATUS_CODE, AttributeValue::from(code));
            span.set_status(http_status_to_status(code, true));
        }
        Err(_) => {
            span.set_status(SpanStatus::Error(format!(
                "Non-integer HTTP status: {:?}",
                token
            )));
        }
    }
}
