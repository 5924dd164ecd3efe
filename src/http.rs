//! Request gateway shared by both backend facades
//!
//! Every remote call goes through [`Gateway::request_json`] or
//! [`Gateway::request_void`]. Each call carries its own timeout budget and an
//! optional [`CancellationToken`]; when either fires first, the in-flight
//! request future is dropped, which aborts the underlying connection, and the
//! caller receives `RtaiError::Timeout` or `RtaiError::Cancelled`. A call
//! therefore resolves exactly once.
//!
//! Success bodies are read as text and opportunistically parsed as JSON:
//! an empty body (or `204 No Content`) yields `null`, and a body that is not
//! JSON is returned as a JSON string holding the raw text. Non-2xx responses
//! become `RtaiError::Server` with a message taken from the body's `detail`,
//! `message` or `error` field, falling back to the HTTP status line.
//!
//! No retries are attempted here.

use crate::error::{Result, RtaiError};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timeout applied when the caller does not choose one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Body keys probed, in order, for a server error message
const ERROR_MESSAGE_KEYS: [&str; 3] = ["detail", "message", "error"];

/// Per-call options
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// JSON body; a `Content-Type: application/json` header is sent only when set
    pub body: Option<Value>,
    /// Wall-clock budget from issuance
    pub timeout: Duration,
    /// Owner-held cancellation handle
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    /// Options for a method with no body and the default timeout
    pub fn new(method: Method) -> Self {
        Self {
            method,
            body: None,
            timeout: DEFAULT_TIMEOUT,
            cancel: None,
        }
    }

    /// `GET` with no body
    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    /// `POST` with a JSON body
    pub fn post(body: Value) -> Self {
        Self::new(Method::POST).with_body(body)
    }

    /// `DELETE` with no body
    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    /// Attach a JSON body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Override the timeout budget
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attach a cancellation token
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// HTTP gateway wrapping a shared `reqwest::Client`
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
}

impl Gateway {
    /// Create a gateway with a fresh HTTP client
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Http` if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("rtai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(RtaiError::Http)?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Issue a call and return its parsed body
    ///
    /// # Errors
    ///
    /// `RtaiError::Timeout`, `Cancelled` or `Transport` for network-level
    /// failures and `RtaiError::Server` for non-2xx responses.
    pub async fn request_json(&self, url: &str, options: RequestOptions) -> Result<Value> {
        self.execute(url, options, true).await
    }

    /// Issue a call whose success is binary; any body is discarded
    pub async fn request_void(&self, url: &str, options: RequestOptions) -> Result<()> {
        self.execute(url, options, false).await.map(|_| ())
    }

    async fn execute(&self, url: &str, options: RequestOptions, read_body: bool) -> Result<Value> {
        let timeout = options.timeout;
        let cancel = options.cancel.clone().unwrap_or_else(CancellationToken::new);
        tracing::debug!(
            method = %options.method,
            url,
            timeout_ms = timeout.as_millis() as u64,
            "Issuing request"
        );

        let call = self.send(url, &options, read_body);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(url, "Request cancelled by caller");
                Err(RtaiError::Cancelled { url: url.to_string() }.into())
            }
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(url, timeout_ms = timeout.as_millis() as u64, "Request timed out, aborting");
                Err(RtaiError::Timeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
                .into())
            }
            result = call => result,
        }
    }

    async fn send(&self, url: &str, options: &RequestOptions, read_body: bool) -> Result<Value> {
        let mut request = self.client.request(options.method.clone(), url);
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;
        let status = response.status();

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!(url, status = status.as_u16(), "Server returned an error");
            return Err(server_error(status, url, text).into());
        }

        if status == StatusCode::NO_CONTENT || !read_body {
            return Ok(Value::Null);
        }

        let text = response
            .text()
            .await
            .map_err(|e| transport_error(url, &e))?;
        Ok(parse_body(&text))
    }
}

/// Parse a success body: empty → `null`, JSON → value, anything else → raw string
///
/// # Examples
///
/// ```
/// use rtai::http::parse_body;
/// use serde_json::{json, Value};
///
/// assert_eq!(parse_body(""), Value::Null);
/// assert_eq!(parse_body(r#"{"ok":true}"#), json!({"ok": true}));
/// assert_eq!(parse_body("plain text"), json!("plain text"));
/// ```
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Build the structured error for a non-2xx response
pub fn server_error(status: StatusCode, url: &str, body: String) -> RtaiError {
    let message = error_message(&parse_body(&body)).unwrap_or_else(|| status_line(status));
    RtaiError::Server {
        status: status.as_u16(),
        url: url.to_string(),
        message,
        body: if body.is_empty() { None } else { Some(body) },
    }
}

/// `"404 Not Found"` style status line
pub fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// Human message carried by an error body, if any
fn error_message(body: &Value) -> Option<String> {
    let object = body.as_object()?;
    ERROR_MESSAGE_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(message_text)
}

fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        Value::Object(map) => map
            .get("message")
            .or_else(|| map.get("msg"))
            .and_then(message_text)
            .or_else(|| Some(value.to_string())),
        // Validation failures arrive as a list of `{loc, msg, type}` entries
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(message_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> anyhow::Error {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    RtaiError::Transport {
        url: url.to_string(),
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body_variants() {
        assert_eq!(parse_body("   "), Value::Null);
        assert_eq!(parse_body("[1,2]"), json!([1, 2]));
        assert_eq!(parse_body("<html>oops</html>"), json!("<html>oops</html>"));
    }

    #[test]
    fn test_server_error_uses_detail() {
        let err = server_error(
            StatusCode::NOT_FOUND,
            "http://h/v1/sessions/x",
            r#"{"detail":"x not found"}"#.to_string(),
        );
        assert_eq!(err.to_string(), "x not found");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_server_error_key_priority() {
        let err = server_error(
            StatusCode::BAD_REQUEST,
            "http://h",
            r#"{"error":"third","message":"second"}"#.to_string(),
        );
        assert_eq!(err.to_string(), "second");
    }

    #[test]
    fn test_server_error_empty_body_uses_status_line() {
        let err = server_error(StatusCode::NOT_FOUND, "http://h", String::new());
        assert_eq!(err.to_string(), "404 Not Found");
        if let RtaiError::Server { body, .. } = err {
            assert!(body.is_none());
        } else {
            panic!("expected server error");
        }
    }

    #[test]
    fn test_server_error_plain_text_body_uses_status_line() {
        let err = server_error(
            StatusCode::BAD_GATEWAY,
            "http://h",
            "upstream down".to_string(),
        );
        assert_eq!(err.to_string(), "502 Bad Gateway");
    }

    #[test]
    fn test_server_error_validation_list() {
        let body = json!({"detail": [
            {"loc": ["body", "history_window"], "msg": "ensure this value is less than or equal to 120", "type": "value_error"},
            {"loc": ["body", "memory_mode"], "msg": "invalid enum", "type": "type_error"}
        ]});
        let err = server_error(StatusCode::UNPROCESSABLE_ENTITY, "http://h", body.to_string());
        assert_eq!(
            err.to_string(),
            "ensure this value is less than or equal to 120; invalid enum"
        );
    }

    #[test]
    fn test_server_error_skips_blank_detail() {
        let err = server_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "http://h",
            r#"{"detail":"","error":{"message":"db locked"}}"#.to_string(),
        );
        assert_eq!(err.to_string(), "db locked");
    }

    #[test]
    fn test_status_line_unknown_reason() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(status_line(status), "599");
    }

    #[test]
    fn test_request_options_builders() {
        let options = RequestOptions::post(json!({"a": 1})).with_timeout(Duration::from_secs(45));
        assert_eq!(options.method, Method::POST);
        assert_eq!(options.timeout, Duration::from_secs(45));
        assert!(options.body.is_some());

        let options = RequestOptions::delete();
        assert_eq!(options.timeout, DEFAULT_TIMEOUT);
        assert!(options.body.is_none());
        assert!(options.cancel.is_none());
    }
}
