//! KEdit Editor
//!
//! Per-language editor setup:
//! - JSON language configurations with user overrides
//! - Tree-sitter highlighting for Kotlin, Java and Rust
//! - Regex highlighting for everything else
//! - Applying engine, palette and feature flags to an editor surface

pub mod applier;
pub mod error;
pub mod language;
pub mod pattern;
pub mod store;
pub mod syntax;

pub use applier::{
    AppliedConfiguration, EditorConfigApplier, EditorSurface, EngineKind, HighlightEngine, ResolvedPalette,
};
pub use error::{EditorError, LanguageError};
pub use language::{Color, ColorPalette, FeatureFlags, LanguageConfiguration};
pub use pattern::PatternHighlighter;
pub use store::{bundled_languages, LanguageConfigStore};
pub use syntax::{GrammarHighlighter, GrammarLanguage, HighlightRange, HighlightType};
