//! Error types for the synchronisation layer.
//!
//! Each variant maps to one failure class. All of them are handled where
//! they occur: per connection on the server, per frame or per tick on the
//! client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The connection or subscription is broken and will not recover.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single frame or response body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A pull request failed at the network or status level.
    #[error("Request error: {0}")]
    Request(String),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Parse(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
