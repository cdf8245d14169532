//! Sink error types.

use thiserror::Error;

/// Errors that can occur when delivering to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The endpoint returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The endpoint rejected our credentials.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The endpoint returned an error response.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// Writing to local storage failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The delivery queue is at capacity.
    #[error("delivery queue full")]
    QueueFull,

    /// The delivery queue has shut down.
    #[error("delivery queue closed")]
    QueueClosed,
}

impl SinkError {
    /// Permanent errors are not worth retrying.
    pub fn is_permanent(&self) -> bool {
        match self {
            SinkError::AuthenticationFailed(_)
            | SinkError::Serialization(_)
            | SinkError::QueueClosed => true,
            SinkError::Http { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Server-provided backoff hint, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SinkError::RateLimited { retry_after_ms } => Some(*retry_after_ms),
            _ => None,
        }
    }
}
