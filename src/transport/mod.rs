//! Shared HTTP client, request headers, and wire framing.

pub mod frame;

pub use frame::{parse_frame, Frame, FrameDecoder, FrameMode};

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE};

use tracing::warn;

use crate::error::ThinkstreamError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout is set: a stream stays open until the server
/// ends it or the caller cancels.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|error| {
                warn!(error = %error, "falling back to a default HTTP client");
                reqwest::Client::new()
            })
    })
}

/// Headers for an event-stream POST.
pub fn stream_headers(api_key: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    if let Some(key) = api_key {
        if let Ok(val) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, val);
        }
    }
    headers
}

/// Turn a non-success response into an error.
pub fn status_to_error(status: u16, body: &str) -> ThinkstreamError {
    let message = extract_error_message(body).unwrap_or_else(|| body.trim().to_string());
    ThinkstreamError::api(status, message)
}

fn extract_error_message(body: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_client_is_built_once() {
        assert!(std::ptr::eq(shared_client(), shared_client()));
    }

    #[test]
    fn stream_headers_request_event_stream() {
        let headers = stream_headers(Some("secret"));
        assert_eq!(headers[ACCEPT], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret");
        assert!(stream_headers(None).get(AUTHORIZATION).is_none());
    }

    #[test]
    fn status_error_prefers_structured_message() {
        let err = status_to_error(500, r#"{"error":{"message":"backend down"}}"#);
        assert_eq!(err.to_string(), "API error (status 500): backend down");

        let err = status_to_error(400, r#"{"error":"bad payload"}"#);
        assert_eq!(err.to_string(), "API error (status 400): bad payload");

        let err = status_to_error(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "API error (status 502): Bad Gateway");
    }
}
