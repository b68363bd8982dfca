//! Error types for the Mastodon client.
//!
//! Separates terminal failures of a call (configuration, connection, HTTP
//! status) from failures scoped to a single streamed event, which never end
//! a subscription.

use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for Mastodon operations.
pub type MastodonResult<T> = Result<T, MastodonError>;

/// Error type for Mastodon client operations.
#[derive(Debug, Error)]
pub enum MastodonError {
    /// Configuration error (missing token, invalid base URL, etc.)
    #[error("Configuration error: {message}")]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// A request could not be built from the given input.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What was wrong with the input.
        message: String,
        /// The parameter or header that caused the error.
        param: Option<String>,
    },

    /// Socket connect, TLS handshake, or read failure.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// No bytes arrived within the configured read timeout.
    #[error("Read timed out after {timeout:?}")]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The server rejected the credentials (401/403).
    #[error("Unauthorized (HTTP {status}): {message}")]
    Unauthorized {
        /// HTTP status code.
        status: u16,
        /// Error message from the server.
        message: String,
    },

    /// Any other non-2xx response.
    #[error("HTTP error {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Error message from the server.
        message: String,
        /// Request ID for debugging.
        request_id: Option<String>,
    },

    /// A recognized event carried a payload that failed to decode.
    #[error(transparent)]
    MalformedEvent(#[from] MalformedEventError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

/// Decode failure for a single streamed event.
///
/// Scoped to one frame: the connection and the decoder stay usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed '{event_type}' event: {reason}")]
pub struct MalformedEventError {
    /// The event type of the frame.
    pub event_type: String,
    /// Why decoding failed.
    pub reason: String,
}

impl MalformedEventError {
    /// Creates a malformed event error.
    pub fn new(event_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            reason: reason.into(),
        }
    }
}

impl MastodonError {
    /// Returns true if a fresh attempt may succeed.
    ///
    /// Nothing in this crate retries; this is for callers layering their own
    /// reconnect policy around a subscription.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MastodonError::Connection { .. }
                | MastodonError::Timeout { .. }
                | MastodonError::Http { status: 500..=599, .. }
        )
    }

    /// Returns true if this error ends a streaming subscription.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MastodonError::MalformedEvent(_))
    }

    /// Returns the HTTP status code, if the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            MastodonError::Unauthorized { status, .. } | MastodonError::Http { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        MastodonError::InvalidRequest {
            message: message.into(),
            param: None,
        }
    }

    /// Creates an invalid request error for a named parameter.
    pub fn invalid_param(message: impl Into<String>, param: impl Into<String>) -> Self {
        MastodonError::InvalidRequest {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        MastodonError::Configuration {
            message: message.into(),
        }
    }

    /// Maps a non-2xx response to an error.
    ///
    /// Mastodon reports failures as `{"error": "..."}`; anything else falls
    /// back to the raw body or the status line.
    pub fn from_response(status: u16, request_id: Option<String>, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ApiErrorResponse>(body)
            .map(|e| match e.error_description {
                Some(description) => format!("{}: {}", e.error, description),
                None => e.error,
            })
            .unwrap_or_else(|_| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() {
                    format!("HTTP error: {status}")
                } else {
                    text
                }
            });

        match status {
            401 | 403 => MastodonError::Unauthorized { status, message },
            _ => MastodonError::Http {
                status,
                message,
                request_id,
            },
        }
    }
}

/// API error response from Mastodon.
#[derive(Debug, serde::Deserialize)]
pub struct ApiErrorResponse {
    /// The error message.
    pub error: String,
    /// Additional detail sent by OAuth endpoints.
    #[serde(default)]
    pub error_description: Option<String>,
}

impl From<TransportError> for MastodonError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { timeout } => MastodonError::Timeout { timeout },
            TransportError::InvalidRequest { message } => MastodonError::InvalidRequest {
                message,
                param: None,
            },
            other => MastodonError::Connection {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for MastodonError {
    fn from(err: serde_json::Error) -> Self {
        MastodonError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for MastodonError {
    fn from(err: url::ParseError) -> Self {
        MastodonError::InvalidRequest {
            message: format!("Invalid URL: {err}"),
            param: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(MastodonError::Connection {
            message: "reset".to_string(),
        }
        .is_retryable());

        assert!(MastodonError::Http {
            status: 503,
            message: "test".to_string(),
            request_id: None,
        }
        .is_retryable());

        assert!(!MastodonError::Unauthorized {
            status: 401,
            message: "test".to_string(),
        }
        .is_retryable());

        assert!(!MastodonError::Http {
            status: 404,
            message: "test".to_string(),
            request_id: None,
        }
        .is_retryable());
    }

    #[test]
    fn test_malformed_event_is_not_terminal() {
        let error: MastodonError = MalformedEventError::new("update", "eof").into();
        assert!(!error.is_terminal());
        assert!(MastodonError::configuration("x").is_terminal());
    }

    #[test]
    fn test_from_response_unauthorized() {
        let error = MastodonError::from_response(
            401,
            None,
            br#"{"error":"The access token is invalid"}"#,
        );

        match error {
            MastodonError::Unauthorized { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "The access token is invalid");
            }
            other => panic!("Expected Unauthorized, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_plain_body() {
        let error = MastodonError::from_response(502, Some("abc".to_string()), b"Bad Gateway\n");

        match error {
            MastodonError::Http {
                status,
                message,
                request_id,
            } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
                assert_eq!(request_id.as_deref(), Some("abc"));
            }
            other => panic!("Expected Http, got {other:?}"),
        }
    }

    #[test]
    fn test_from_response_empty_body() {
        let error = MastodonError::from_response(404, None, b"");
        assert_eq!(error.status(), Some(404));
        assert!(error.to_string().contains("HTTP error: 404"));
    }

    #[test]
    fn test_transport_timeout_maps_to_timeout() {
        let error: MastodonError = TransportError::Timeout {
            timeout: Duration::from_secs(5),
        }
        .into();

        assert!(matches!(error, MastodonError::Timeout { .. }));
    }
}
