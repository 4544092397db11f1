//! Editor crate errors

use std::path::PathBuf;
use thiserror::Error;

use kedit_core::KEditError;

/// Failures while reading or writing language configurations
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("Language name is empty")]
    EmptyName,

    #[error("Invalid language name '{0}'")]
    InvalidName(String),

    #[error("No configuration for language '{0}'")]
    Unknown(String),

    #[error("Malformed configuration {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Bundled configuration for '{language}' is invalid: {source}")]
    InvalidBundled {
        language: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while building a highlighter or configuring a surface
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Language(#[from] LanguageError),

    #[error("Invalid color '{value}' for {slot}")]
    InvalidColor { slot: String, value: String },

    #[error("Invalid pattern for {category}: {source}")]
    InvalidPattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid feature setting: {0}")]
    InvalidFeature(String),

    #[error("Grammar setup failed: {0}")]
    Grammar(String),

    #[error("Surface rejected {step}: {reason}")]
    Surface { step: &'static str, reason: String },
}

impl From<LanguageError> for KEditError {
    fn from(err: LanguageError) -> Self {
        match err {
            LanguageError::Io(e) => KEditError::Io(e),
            LanguageError::Unknown(name) => KEditError::NotFound(format!("language '{}'", name)),
            other => KEditError::LanguageConfig(other.to_string()),
        }
    }
}

impl From<EditorError> for KEditError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::Language(e) => e.into(),
            other => KEditError::Editor(other.to_string()),
        }
    }
}
