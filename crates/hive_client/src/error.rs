//! Error types for the client layer.

use std::time::Duration;

use thiserror::Error;

use hive_core::HiveError;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors raised while talking to the backend or applying its responses.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Session {session_id} not ready after {attempts} attempts")]
    NotReady { session_id: String, attempts: u32 },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Store error: {0}")]
    Store(#[from] HiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// The backend does not know the session (yet).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::SessionNotFound(_) => true,
            Self::Status { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// The failure is about reaching the backend rather than the request itself.
    pub fn is_connection(&self) -> bool {
        match self {
            Self::Network(e) => e.is_connect() || e.is_timeout(),
            Self::Timeout(_) | Self::Unavailable(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
