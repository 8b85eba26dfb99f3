use std::time::Duration;

use thiserror::Error;

/// Errors returned to callers of the request/response layer.
///
/// Every variant is terminal for the current `call` or `serve_once`; the
/// layer never retries on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Uninitialized: {0}")]
    Uninitialized(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Channel creation failed: {0}")]
    ChannelCreationFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Handler declined to produce a response")]
    HandlerDeclined,

    #[error("Invalid type tag: {0}")]
    InvalidTag(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Returns `true` for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
