//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No session token, or the server rejected it.
    #[error("Session expired. Please login again.")]
    Unauthenticated,

    /// The server answered with a non-success status.
    #[error("{0}")]
    RequestFailed(String),

    /// The scan was stopped or superseded before the server accepted it.
    #[error("Scan start cancelled")]
    Cancelled,

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sign-in or session storage error.
    #[error("Auth error: {0}")]
    Auth(#[from] talentscan_auth::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
