//! Typed errors for the tracker library.
//!
//! None of these ever escape the tracking surface (`track`, `page`,
//! `set_user`, ...). They are returned by constructors and collaborator
//! seams, and logged and swallowed at the transport boundary.

use thiserror::Error;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised by the tracker's collaborators.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Transport failed to deliver or could not be built
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Payload could not be serialized
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A path glob could not be compiled
    #[error("invalid path pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Persistent storage failed (I/O, quota, corrupt file)
    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors raised while sending a request.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The delivery mechanism is missing (no runtime, no client)
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// Connection failed or the request was rejected before a response
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Network(err.to_string())
    }
}
