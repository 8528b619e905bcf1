//! Error types for sign-in and session operations.

use crate::store::StorageError;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Auth error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The consent window could not be opened.
    #[error("Sign-in window was blocked")]
    PopupBlocked,

    /// The server answered with a structured non-success response.
    #[error("Sign-in rejected: {0}")]
    Rejected(String),

    /// The identity provider reported an error through the completion message.
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// HTTP transport failure (server unreachable, connection reset, ...).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Session persistence failed.
    #[error("Session storage error: {0}")]
    Storage(#[from] StorageError),

    /// The attempt was abandoned because another attempt started.
    #[error("Sign-in attempt superseded by a newer attempt")]
    Superseded,

    /// The attempt was cancelled by the caller.
    #[error("Sign-in attempt cancelled")]
    Cancelled,

    /// The message source closed before a completion message arrived.
    #[error("Sign-in message channel closed")]
    ChannelClosed,
}

impl Error {
    /// Text for the blocking notice shown to the recruiter.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::PopupBlocked => {
                "Popup blocked! Please allow popups for this site.".to_string()
            }
            Self::Rejected(reason) => reason.clone(),
            Self::OAuth(reason) => format!("Login failed: {reason}"),
            Self::Transport(_) => {
                "Failed to login. Make sure the backend is running.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Returns true for connectivity failures, as opposed to rejections.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
