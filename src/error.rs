//! Error types for the negotiation hub

use thiserror::Error;

/// Main error type for the hub
#[derive(Error, Debug)]
pub enum HubError {
    // Client input errors (reported to the sender only)
    #[error("Invalid role: {0}")]
    RoleInvalid(String),

    #[error("Role has not been set for this connection")]
    RoleRequired,

    #[error("Invalid price: {0:?}")]
    InvalidPrice(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    // External dependency errors
    #[error("Advisory service error: {0}")]
    Advisory(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    // Transport errors
    #[error("Connection error: {0}")]
    Connection(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HubError {
    /// Errors caused by what a client sent. These are answered on the
    /// offending connection and never close it.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HubError::RoleInvalid(_)
                | HubError::RoleRequired
                | HubError::InvalidPrice(_)
                | HubError::UnknownMessageType(_)
                | HubError::MalformedFrame(_)
        )
    }

    /// Text placed in the `error` / `status` frame sent back to a client
    pub fn client_text(&self) -> String {
        self.to_string()
    }
}

impl From<reqwest::Error> for HubError {
    fn from(err: reqwest::Error) -> Self {
        HubError::Advisory(err.to_string())
    }
}

/// Result type alias for hub operations
pub type Result<T> = std::result::Result<T, HubError>;
