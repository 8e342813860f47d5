//! Error types for session operations.

use reqwest::StatusCode;

/// Error types for session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("Session expired. Please log in again.")]
    SessionTerminated,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is waiting for administrator approval")]
    PendingApproval,

    #[error("Server returned {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("Server response did not carry an access token")]
    MissingToken,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    /// Whether this error ends the session and requires a fresh login.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::SessionTerminated)
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
