//! Common error types used throughout sharegate.
//!
//! Every failure a share request can run into ends up as one of these
//! variants. [`Error::http_status`] gives the fixed status code the HTTP
//! layer answers with, so denial precedence stays deterministic.

use crate::guard::DenyReason;

/// Maximum number of characters kept from an origin error body.
pub const ORIGIN_SNIPPET_LIMIT: usize = 300;

/// Common error type for sharegate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No share exists for the token (unknown or already purged).
    #[error("Share not found: {0}")]
    NotFound(String),

    /// The share reached its expiry instant.
    #[error("Share has expired")]
    Expired,

    /// The share has used up all of its views.
    #[error("Share view quota exhausted")]
    QuotaExhausted,

    /// The requester's address is not on the share's allowlist.
    #[error("Address not allowed for this share")]
    IpNotAllowed,

    /// The origin answered with something that is not an HLS playlist.
    #[error("Invalid playlist: {0}")]
    InvalidPlaylist(String),

    /// The origin returned an error status or could not be reached.
    #[error("Origin error{}: {snippet}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Origin {
        /// HTTP status returned by the origin, `None` when unreachable.
        status: Option<u16>,
        /// Truncated origin response body or transport error text.
        snippet: String,
    },

    /// Malformed share creation or edit request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Admin credentials missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(token: S) -> Self {
        Self::NotFound(token.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new InvalidPlaylist error.
    pub fn invalid_playlist<S: Into<String>>(msg: S) -> Self {
        Self::InvalidPlaylist(msg.into())
    }

    /// Create an Origin error, collapsing whitespace and truncating the body.
    pub fn origin(status: Option<u16>, body: &str) -> Self {
        Self::Origin {
            status,
            snippet: shorten(body, ORIGIN_SNIPPET_LIMIT),
        }
    }

    /// Map this error to the HTTP status code the proxy answers with.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Expired | Self::QuotaExhausted => 410,
            Self::IpNotAllowed => 403,
            Self::InvalidPlaylist(_) | Self::Origin { .. } => 502,
            Self::Validation(_) => 400,
            Self::Unauthorized => 401,
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Expired => "expired",
            Self::QuotaExhausted => "quota_exhausted",
            Self::IpNotAllowed => "ip_not_allowed",
            Self::InvalidPlaylist(_) => "invalid_playlist",
            Self::Origin { .. } => "origin_error",
            Self::Validation(_) => "validation_error",
            Self::Unauthorized => "unauthorized",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl Error {
    /// Message returned to HTTP callers.
    ///
    /// Origin failures and server-side errors get a fixed text; their
    /// details (origin bodies can echo origin URLs and keys) only go to the
    /// logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Origin { .. } => "Origin request failed".to_string(),
            Self::InvalidPlaylist(_) => "Origin returned an invalid playlist".to_string(),
            Self::Database(_) | Self::Io(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<DenyReason> for Error {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::Expired => Self::Expired,
            DenyReason::QuotaExhausted => Self::QuotaExhausted,
            DenyReason::IpNotAllowed => Self::IpNotAllowed,
        }
    }
}

/// Collapse runs of whitespace and cut the text to `limit` characters.
fn shorten(text: &str, limit: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(limit.saturating_sub(5)).collect();
    out.push_str(" [...]");
    out
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
