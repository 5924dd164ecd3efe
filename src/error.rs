//! Error types for rtai
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.
//!
//! Errors fall into four families: validation errors raised before any
//! network call, transport errors (timeout, cancellation, connection
//! failure), server-reported errors carrying the HTTP status and originating
//! URL, and local failures (storage, configuration, I/O).

use thiserror::Error;

/// Main error type for rtai operations
#[derive(Error, Debug)]
pub enum RtaiError {
    /// Local, pre-network validation failure (e.g. missing session id)
    #[error("{0}")]
    Validation(String),

    /// Call exceeded its timeout budget and was aborted
    #[error("Request timed out after {timeout_ms} ms: {url}")]
    Timeout {
        /// Request URL
        url: String,
        /// Budget that elapsed
        timeout_ms: u64,
    },

    /// Call was cancelled by its owner before completion
    #[error("Request cancelled: {url}")]
    Cancelled {
        /// Request URL
        url: String,
    },

    /// Connection refused, DNS failure, or body read failure
    #[error("Network error calling {url}: {message}")]
    Transport {
        /// Request URL
        url: String,
        /// Underlying transport message
        message: String,
    },

    /// Non-2xx response from a backend
    #[error("{message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Request URL
        url: String,
        /// Message extracted from the body, or the status line
        message: String,
        /// Raw response body
        body: Option<String>,
    },

    /// Success body that does not match the typed record it should carry
    #[error("Unexpected response from {url}: {message}")]
    Decode {
        /// Request URL
        url: String,
        /// Decoder message
        message: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable state storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Interactive console errors
    #[error("Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}

impl RtaiError {
    /// Whether this error was raised before any network call was made
    pub fn is_validation(&self) -> bool {
        matches!(self, RtaiError::Validation(_))
    }

    /// Whether this error came from the network layer rather than the server
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RtaiError::Timeout { .. } | RtaiError::Cancelled { .. } | RtaiError::Transport { .. }
        )
    }

    /// HTTP status for server-reported errors
    pub fn status(&self) -> Option<u16> {
        match self {
            RtaiError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Text shown to the operator for this error
    ///
    /// Server messages are shown verbatim together with the URL that
    /// produced them; everything else uses its display form.
    pub fn concern_message(&self) -> String {
        match self {
            RtaiError::Server {
                status,
                url,
                message,
                ..
            } => format!("{} (HTTP {} from {})", message, status, url),
            other => other.to_string(),
        }
    }
}

/// Result type alias for rtai operations
///
/// Uses `anyhow::Error` so context can be attached while `RtaiError`
/// stays reachable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;

/// Render any error for display in a concern's error slot
///
/// Uses [`RtaiError::concern_message`] when the root cause is an
/// `RtaiError`, and the plain display form otherwise.
pub fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<RtaiError>() {
        Some(e) => e.concern_message(),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = RtaiError::Validation("Missing session id".to_string());
        assert_eq!(error.to_string(), "Missing session id");
        assert!(error.is_validation());
        assert!(!error.is_transport());
    }

    #[test]
    fn test_timeout_error_display() {
        let error = RtaiError::Timeout {
            url: "http://h/health".to_string(),
            timeout_ms: 7000,
        };
        assert_eq!(
            error.to_string(),
            "Request timed out after 7000 ms: http://h/health"
        );
        assert!(error.is_transport());
    }

    #[test]
    fn test_server_error_display_is_message() {
        let error = RtaiError::Server {
            status: 404,
            url: "http://h/v1/sessions/x".to_string(),
            message: "x not found".to_string(),
            body: None,
        };
        assert_eq!(error.to_string(), "x not found");
        assert_eq!(error.status(), Some(404));
        assert_eq!(
            error.concern_message(),
            "x not found (HTTP 404 from http://h/v1/sessions/x)"
        );
    }

    #[test]
    fn test_transport_error_display() {
        let error = RtaiError::Transport {
            url: "http://127.0.0.1:1/health".to_string(),
            message: "connection refused".to_string(),
        };
        assert!(error.to_string().contains("connection refused"));
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_describe_downcasts() {
        let err: anyhow::Error = RtaiError::Cancelled {
            url: "http://h/run".to_string(),
        }
        .into();
        assert_eq!(describe(&err), "Request cancelled: http://h/run");

        let plain = anyhow::anyhow!("plain failure");
        assert_eq!(describe(&plain), "plain failure");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let error: RtaiError = json_error.into();
        assert!(matches!(error, RtaiError::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RtaiError>();
    }
}
