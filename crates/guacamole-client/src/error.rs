//! Guacamole client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Guacamole REST API
#[derive(Debug, Error)]
pub enum GuacamoleError {
    /// Token request was rejected or could not be completed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Guacamole answered with a non-success status
    #[error("Guacamole API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The referenced connection does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., malformed base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GuacamoleError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the error means the connection is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
