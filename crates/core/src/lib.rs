//! KEdit Core - Shared types
//! 
//! This crate holds what every other KEdit crate agrees on: the application
//! configuration, the error taxonomy, the event bus, and the compilation
//! state/result model the UI layer renders.

pub mod compilation;
pub mod config;
pub mod events;
pub mod error;

pub use compilation::{
    CompilationMessage, CompilationResult, CompilationSnapshot, CompilationState,
    CompilationTracker, FailureKind, Severity,
};
pub use config::{AppConfig, BridgeSettings, EditorDefaults};
pub use events::{Event, EventBus, EventSubscription};
pub use error::{KEditError, Result};

/// KEdit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "KEdit";
