//! Editor Configuration Applier
//!
//! Configures an editor surface for a language: picks the highlight engine,
//! resolves the color palette and pushes the feature flags. Any failure
//! along the way leaves the surface on a minimal plain configuration instead
//! of an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use kedit_core::{Event, EventBus};

use crate::error::EditorError;
use crate::language::{normalize_name, Color, ColorPalette, FeatureFlags, LanguageConfiguration};
use crate::pattern::PatternHighlighter;
use crate::store::LanguageConfigStore;
use crate::syntax::{GrammarHighlighter, GrammarLanguage, HighlightRange, HighlightType};

/// Which engine highlights a language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Grammar,
    Pattern,
    Plain,
}

impl EngineKind {
    /// Grammar when one is compiled in, patterns when the configuration has
    /// any, else plain text
    pub fn select(language: &str, config: &LanguageConfiguration) -> Self {
        if GrammarLanguage::from_name(language).is_some() {
            EngineKind::Grammar
        } else if !config.is_empty() {
            EngineKind::Pattern
        } else {
            EngineKind::Plain
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Grammar => "grammar",
            EngineKind::Pattern => "pattern",
            EngineKind::Plain => "plain",
        }
    }
}

/// A ready-to-use highlighter
pub enum HighlightEngine {
    Grammar(GrammarHighlighter),
    Pattern(PatternHighlighter),
    Plain,
}

impl HighlightEngine {
    pub fn build(language: &str, config: &LanguageConfiguration) -> Result<Self, EditorError> {
        match EngineKind::select(language, config) {
            EngineKind::Grammar => {
                let grammar = GrammarLanguage::from_name(language)
                    .ok_or_else(|| EditorError::Grammar(format!("no grammar for {}", language)))?;
                Ok(HighlightEngine::Grammar(GrammarHighlighter::new(grammar)?))
            }
            EngineKind::Pattern => Ok(HighlightEngine::Pattern(PatternHighlighter::from_config(config)?)),
            EngineKind::Plain => Ok(HighlightEngine::Plain),
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            HighlightEngine::Grammar(_) => EngineKind::Grammar,
            HighlightEngine::Pattern(_) => EngineKind::Pattern,
            HighlightEngine::Plain => EngineKind::Plain,
        }
    }

    pub fn highlight(&mut self, text: &str) -> Vec<HighlightRange> {
        match self {
            HighlightEngine::Grammar(grammar) => grammar.highlight(text),
            HighlightEngine::Pattern(pattern) => pattern.highlight(text),
            HighlightEngine::Plain => Vec::new(),
        }
    }
}

impl std::fmt::Debug for HighlightEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HighlightEngine({})", self.kind().as_str())
    }
}

/// Palette with every slot filled in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPalette {
    pub background: Color,
    pub foreground: Color,
    pub keyword: Color,
    pub string: Color,
    pub comment: Color,
    pub number: Color,
    pub function: Color,
    pub type_name: Color,
    pub operator: Color,
    pub annotation: Color,
    pub line_number: Color,
    pub current_line: Color,
    pub bracket_match: Color,
}

impl ResolvedPalette {
    /// Built-in dark palette
    pub fn dark() -> Self {
        Self {
            background: Color::rgb(0x1e, 0x1e, 0x1e),
            foreground: Color::rgb(0xd4, 0xd4, 0xd4),
            keyword: Color::rgb(0x56, 0x9c, 0xd6),
            string: Color::rgb(0xce, 0x91, 0x78),
            comment: Color::rgb(0x6a, 0x99, 0x55),
            number: Color::rgb(0xb5, 0xce, 0xa8),
            function: Color::rgb(0xdc, 0xdc, 0xaa),
            type_name: Color::rgb(0x4e, 0xc9, 0xb0),
            operator: Color::rgb(0xd4, 0xd4, 0xd4),
            annotation: Color::rgb(0xc5, 0x86, 0xc0),
            line_number: Color::rgb(0x85, 0x85, 0x85),
            current_line: Color::rgb(0x28, 0x28, 0x28),
            bracket_match: Color::rgb(0x3a, 0x3d, 0x41),
        }
    }

    /// Overlay the set entries of `palette` on top of `self`
    pub fn overlay(&self, palette: &ColorPalette) -> Result<Self, EditorError> {
        let mut resolved = self.clone();
        for (slot, value) in palette.entries() {
            let color = Color::from_hex(value).ok_or_else(|| EditorError::InvalidColor {
                slot: slot.to_string(),
                value: value.to_string(),
            })?;
            if let Some(target) = resolved.slot_mut(slot) {
                *target = color;
            }
        }
        Ok(resolved)
    }

    pub fn color_for(&self, highlight_type: HighlightType) -> Color {
        match highlight_type.palette_slot() {
            "keyword" => self.keyword,
            "string" => self.string,
            "number" => self.number,
            "comment" => self.comment,
            "function" => self.function,
            "type" => self.type_name,
            "operator" => self.operator,
            "annotation" => self.annotation,
            _ => self.foreground,
        }
    }

    fn slot_mut(&mut self, slot: &str) -> Option<&mut Color> {
        match slot {
            "background" => Some(&mut self.background),
            "foreground" => Some(&mut self.foreground),
            "keyword" => Some(&mut self.keyword),
            "string" => Some(&mut self.string),
            "comment" => Some(&mut self.comment),
            "number" => Some(&mut self.number),
            "function" => Some(&mut self.function),
            "type" => Some(&mut self.type_name),
            "operator" => Some(&mut self.operator),
            "annotation" => Some(&mut self.annotation),
            "line_number" => Some(&mut self.line_number),
            "current_line" => Some(&mut self.current_line),
            "bracket_match" => Some(&mut self.bracket_match),
            _ => None,
        }
    }
}

impl Default for ResolvedPalette {
    fn default() -> Self {
        Self::dark()
    }
}

/// The editor widget being configured.
///
/// Each step may refuse with a reason; the applier then falls back.
pub trait EditorSurface {
    fn set_engine(&mut self, engine: HighlightEngine) -> Result<(), String>;
    fn set_palette(&mut self, palette: &ResolvedPalette) -> Result<(), String>;
    fn set_features(&mut self, features: &FeatureFlags) -> Result<(), String>;
}

/// What ended up on the surface
#[derive(Debug, Clone, Serialize)]
pub struct AppliedConfiguration {
    pub language: String,
    pub engine: EngineKind,
    pub palette: ResolvedPalette,
    pub features: FeatureFlags,
    /// The minimal configuration was used instead of the language's own
    pub fallback: bool,
    /// Why the fallback was needed
    pub reason: Option<String>,
}

/// Applies language configurations to editor surfaces
pub struct EditorConfigApplier {
    store: Arc<LanguageConfigStore>,
    defaults: FeatureFlags,
    event_bus: Option<Arc<EventBus>>,
}

impl EditorConfigApplier {
    pub fn new(store: Arc<LanguageConfigStore>) -> Self {
        Self {
            store,
            defaults: FeatureFlags::default(),
            event_bus: None,
        }
    }

    /// Feature flags used by the fallback configuration
    pub fn with_defaults(mut self, defaults: FeatureFlags) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn store(&self) -> &LanguageConfigStore {
        &self.store
    }

    /// Configure `surface` for `language`. Never fails.
    pub async fn apply<S: EditorSurface + ?Sized>(&self, language: &str, surface: &mut S) -> AppliedConfiguration {
        let language = normalize_name(language);

        let applied = match self.try_apply(&language, surface).await {
            Ok(applied) => {
                info!("Configured editor for {} ({})", language, applied.engine.as_str());
                applied
            }
            Err(e) => {
                warn!("Falling back to plain configuration for {}: {}", language, e);
                if let Some(bus) = &self.event_bus {
                    bus.emit(Event::Error {
                        message: format!("Editor configuration for {} failed", language),
                        details: Some(e.to_string()),
                    });
                }
                self.apply_fallback(&language, surface, e.to_string())
            }
        };

        if let Some(bus) = &self.event_bus {
            bus.emit(Event::EditorConfigured {
                language: applied.language.clone(),
                fallback: applied.fallback,
            });
        }
        applied
    }

    /// Like [`apply`](Self::apply) but reports the failure instead of falling back
    pub async fn try_apply<S: EditorSurface + ?Sized>(
        &self,
        language: &str,
        surface: &mut S,
    ) -> Result<AppliedConfiguration, EditorError> {
        let language = normalize_name(language);
        let config = self.store.load(&language).await?;

        // Build everything before touching the surface
        let engine = HighlightEngine::build(&language, &config)?;
        let palette = match &config.colors {
            Some(colors) => ResolvedPalette::dark().overlay(colors)?,
            None => ResolvedPalette::dark(),
        };
        validate_features(&config.features)?;

        let engine_kind = engine.kind();
        debug!("Applying {} engine for {}", engine_kind.as_str(), language);

        surface
            .set_engine(engine)
            .map_err(|reason| EditorError::Surface { step: "engine", reason })?;
        surface
            .set_palette(&palette)
            .map_err(|reason| EditorError::Surface { step: "palette", reason })?;
        surface
            .set_features(&config.features)
            .map_err(|reason| EditorError::Surface { step: "features", reason })?;

        Ok(AppliedConfiguration {
            language,
            engine: engine_kind,
            palette,
            features: config.features,
            fallback: false,
            reason: None,
        })
    }

    fn apply_fallback<S: EditorSurface + ?Sized>(
        &self,
        language: &str,
        surface: &mut S,
        reason: String,
    ) -> AppliedConfiguration {
        let palette = ResolvedPalette::dark();
        let features = self.defaults.clone();

        let steps = [
            ("engine", surface.set_engine(HighlightEngine::Plain)),
            ("palette", surface.set_palette(&palette)),
            ("features", surface.set_features(&features)),
        ];
        for (step, result) in steps {
            if let Err(e) = result {
                error!("Surface rejected fallback {}: {}", step, e);
            }
        }

        AppliedConfiguration {
            language: language.to_string(),
            engine: EngineKind::Plain,
            palette,
            features,
            fallback: true,
            reason: Some(reason),
        }
    }
}

fn validate_features(features: &FeatureFlags) -> Result<(), EditorError> {
    if !(1..=16).contains(&features.tab_size) {
        return Err(EditorError::InvalidFeature(format!(
            "tab_size {} outside 1..=16",
            features.tab_size
        )));
    }
    Ok(())
}
