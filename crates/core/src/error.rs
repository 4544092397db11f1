//! Error types for KEdit
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for KEdit
#[derive(Error, Debug)]
pub enum KEditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bridge error: {0}")]
    Bridge(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Compilation failed: {0}")]
    Compilation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Language configuration error: {0}")]
    LanguageConfig(String),

    #[error("Editor error: {0}")]
    Editor(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled by a newer request")]
    Cancelled,
}

/// Result type alias for KEdit operations
pub type Result<T> = std::result::Result<T, KEditError>;

impl KEditError {
    /// Check if this error is recoverable by retrying the same action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KEditError::Bridge(_)
                | KEditError::Timeout(_)
                | KEditError::Cancelled
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            KEditError::Io(e) => format!("File operation failed: {}", e),
            KEditError::Config(msg) => format!("Configuration error: {}", msg),
            KEditError::Bridge(msg) => {
                format!("Could not reach the desktop bridge: {}. Is it running and forwarded?", msg)
            }
            KEditError::Protocol(msg) => format!("The desktop bridge answered unexpectedly: {}", msg),
            KEditError::Compilation(msg) => msg.clone(),
            KEditError::Validation(msg) => msg.clone(),
            KEditError::LanguageConfig(msg) => format!("Language settings problem: {}", msg),
            KEditError::NotFound(msg) => format!("Not found: {}", msg),
            KEditError::Timeout(msg) => format!("Timed out: {}", msg),
            KEditError::Cancelled => "A newer compile request replaced this one".to_string(),
            _ => self.to_string(),
        }
    }
}
