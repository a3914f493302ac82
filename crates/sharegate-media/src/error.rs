//! Error types for sharegate-media.

use thiserror::Error;

/// Result type for sharegate-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sharegate-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Text that is not an HLS playlist, or a URI line that cannot be mapped.
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),
}

impl Error {
    /// Create an invalid playlist error.
    pub fn invalid_playlist(msg: impl Into<String>) -> Self {
        Self::InvalidPlaylist(msg.into())
    }
}

impl From<Error> for sharegate_common::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidPlaylist(msg) => sharegate_common::Error::InvalidPlaylist(msg),
        }
    }
}
