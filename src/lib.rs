//! KEdit - Android code editor backend
//!
//! Compiles sources written on the device through a desktop companion
//! process, and configures editor highlighting per language.
//!
//! ## Architecture
//!
//! - `kedit-core`: configuration, compilation state, events and errors
//! - `kedit-compiler-bridge`: TCP bridge client, status poller and ADB helper
//! - `kedit-editor`: language configurations, highlight engines and the applier

#![warn(clippy::all)]

pub mod commands;
pub mod context;
pub mod terminal;

pub use kedit_compiler_bridge as bridge;
pub use kedit_core as core;
pub use kedit_editor as editor;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = kedit_core::APP_NAME;

/// Prelude module for convenient imports
pub mod prelude {
    pub use kedit_compiler_bridge::{CompilerBridge, StatusPoller, TcpTransport};
    pub use kedit_core::{AppConfig, CompilationResult, CompilationState, CompilationTracker, EventBus};
    pub use kedit_editor::{EditorConfigApplier, EditorSurface, LanguageConfigStore};
}
