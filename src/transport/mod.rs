//! HTTP transport layer for the Mastodon client.
//!
//! Provides the transport abstraction used by the REST primitives and the
//! streaming connection, and a reqwest implementation that selects plaintext
//! or TLS from the URL scheme.

mod http;

pub use self::http::{
    ByteStream, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
    StreamingResponse,
};

use std::time::Duration;

/// Transport error types.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection error.
    #[error("Connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
    },

    /// Timeout error.
    #[error("Timeout after {timeout:?}")]
    Timeout {
        /// Timeout duration.
        timeout: Duration,
    },

    /// The request could not be sent as built.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Error message.
        message: String,
    },

    /// Reading the response failed.
    #[error("Read error: {message}")]
    Read {
        /// Error message.
        message: String,
    },
}
