use std::io;
use std::time::Duration;
use thiserror::Error;

/// Failures that leave the connection unusable.
#[derive(Debug, Error)]
pub enum MpdError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("timed out connecting to {address} after {timeout:?}")]
    ConnectTimeout { address: String, timeout: Duration },
    #[error("unexpected server greeting: {}", greeting.as_deref().unwrap_or("<nothing>"))]
    Handshake { greeting: Option<String> },
    #[error("server rejected password: {}", response.as_deref().unwrap_or("<nothing>"))]
    Authentication { response: Option<String> },
    #[error("connection error: {0}")]
    Io(#[source] io::Error),
    #[error("connection is closed")]
    Closed,
}

impl MpdError {
    /// Socket-level failure, as opposed to a protocol-level refusal.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            MpdError::Connect { .. } | MpdError::ConnectTimeout { .. } | MpdError::Io(_) | MpdError::Closed
        )
    }
}

/// Outcome of a failed `add`.
#[derive(Debug, Error)]
pub enum EnqueueError {
    /// The server answered with something other than `OK`, typically an `ACK` line.
    #[error("server refused to add {path}: {}", if response.is_empty() { "<nothing>" } else { response.as_str() })]
    Rejected { path: String, response: String },
    #[error(transparent)]
    Connection(#[from] MpdError),
}

pub type MpdResult<T> = Result<T, MpdError>;
