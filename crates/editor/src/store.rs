//! Language Configuration Store
//!
//! Resolves a language name to its configuration. A user override in the
//! override directory wins over the bundled default, which wins over a
//! synthesized template.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use kedit_core::{AppConfig, Event, EventBus};

use crate::error::LanguageError;
use crate::language::{normalize_name, LanguageConfiguration};

/// Defaults compiled into the binary
const BUNDLED: &[(&str, &str)] = &[
    ("cpp", include_str!("../assets/languages/cpp.json")),
    ("java", include_str!("../assets/languages/java.json")),
    ("javascript", include_str!("../assets/languages/javascript.json")),
    ("kotlin", include_str!("../assets/languages/kotlin.json")),
    ("python", include_str!("../assets/languages/python.json")),
];

/// Names of the languages that ship with a default configuration
pub fn bundled_languages() -> impl Iterator<Item = &'static str> {
    BUNDLED.iter().map(|(name, _)| *name)
}

/// Loads, saves and resets per-language configurations
pub struct LanguageConfigStore {
    override_dir: PathBuf,
    event_bus: Option<Arc<EventBus>>,
}

impl LanguageConfigStore {
    pub fn new(override_dir: impl Into<PathBuf>) -> Self {
        Self {
            override_dir: override_dir.into(),
            event_bus: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.language_override_dir())
    }

    /// Publish save/reset events on `bus`
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn override_dir(&self) -> &Path {
        &self.override_dir
    }

    /// Where the override for `language` lives
    pub fn override_path(&self, language: &str) -> Result<PathBuf, LanguageError> {
        let key = language_key(language)?;
        Ok(self.override_dir.join(format!("{}.json", key)))
    }

    /// The bundled default, ignoring any override
    pub fn bundled(&self, language: &str) -> Result<Option<LanguageConfiguration>, LanguageError> {
        let key = language_key(language)?;
        parse_bundled(&key)
    }

    /// Resolve `language`, skipping an override that cannot be read or parsed
    pub async fn load(&self, language: &str) -> Result<LanguageConfiguration, LanguageError> {
        let key = language_key(language)?;

        match self.read_override(&key).await {
            Ok(Some(config)) => return Ok(config),
            Ok(None) => {}
            Err(e) => {
                warn!("Ignoring override for {}: {}", key, e);
                self.emit(Event::Error {
                    message: format!("Override for {} ignored", key),
                    details: Some(e.to_string()),
                });
            }
        }

        self.default_for(&key)
    }

    /// Resolve `language`, failing on a malformed override
    pub async fn try_load(&self, language: &str) -> Result<LanguageConfiguration, LanguageError> {
        let key = language_key(language)?;

        if let Some(config) = self.read_override(&key).await? {
            return Ok(config);
        }

        self.default_for(&key)
    }

    /// Write `config` as the override for its language
    pub async fn save(&self, config: &LanguageConfiguration) -> Result<PathBuf, LanguageError> {
        let key = language_key(&config.name)?;
        let path = self.override_dir.join(format!("{}.json", key));

        let mut config = config.clone();
        config.name = key.clone();
        let json = serde_json::to_string_pretty(&config)?;

        tokio::fs::create_dir_all(&self.override_dir).await?;

        // Readers only ever see the old or the new file
        let staging = self.override_dir.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&staging, json).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        info!("Saved {} configuration to {:?}", key, path);
        self.emit(Event::LanguageConfigSaved { language: key });
        Ok(path)
    }

    /// Drop the override for `language`. Returns whether one existed.
    pub async fn reset(&self, language: &str) -> Result<bool, LanguageError> {
        let path = self.override_path(language)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                let key = normalize_name(language);
                info!("Reset {} configuration", key);
                self.emit(Event::LanguageConfigReset { language: key });
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No override to reset at {:?}", path);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn has_override(&self, language: &str) -> bool {
        match self.override_path(language) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Bundled languages plus every language with an override, sorted.
    ///
    /// Files whose stem is not a valid language name are skipped.
    pub async fn list_languages(&self) -> Result<Vec<String>, LanguageError> {
        let mut names: BTreeSet<String> = bundled_languages().map(str::to_string).collect();

        let mut entries = match tokio::fs::read_dir(&self.override_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(names.into_iter().collect()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            match language_key(stem) {
                Ok(key) => {
                    names.insert(key);
                }
                Err(e) => debug!("Skipping {:?}: {}", path, e),
            }
        }

        Ok(names.into_iter().collect())
    }

    /// The language whose configuration claims `extension`
    pub async fn language_for_extension(&self, extension: &str) -> Result<Option<String>, LanguageError> {
        for name in self.list_languages().await? {
            match self.load(&name).await {
                Ok(config) if config.handles_extension(extension) => return Ok(Some(name)),
                Ok(_) => {}
                Err(e) => warn!("Skipping {} while matching .{}: {}", name, extension, e),
            }
        }
        Ok(None)
    }

    async fn read_override(&self, key: &str) -> Result<Option<LanguageConfiguration>, LanguageError> {
        let path = self.override_dir.join(format!("{}.json", key));

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut config: LanguageConfiguration = serde_json::from_str(&contents)
            .map_err(|source| LanguageError::Malformed { path: path.clone(), source })?;
        config.name = key.to_string();

        debug!("Loaded {} override from {:?}", key, path);
        Ok(Some(config))
    }

    fn default_for(&self, key: &str) -> Result<LanguageConfiguration, LanguageError> {
        if let Some(config) = parse_bundled(key)? {
            debug!("Using bundled {} configuration", key);
            return Ok(config);
        }
        debug!("No configuration for {}, using template", key);
        Ok(LanguageConfiguration::template(key))
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

fn parse_bundled(key: &str) -> Result<Option<LanguageConfiguration>, LanguageError> {
    let Some((_, json)) = BUNDLED.iter().find(|(name, _)| *name == key) else {
        return Ok(None);
    };
    serde_json::from_str(json)
        .map(Some)
        .map_err(|source| LanguageError::InvalidBundled {
            language: key.to_string(),
            source,
        })
}

/// Normalized name, safe to use as a file name
fn language_key(language: &str) -> Result<String, LanguageError> {
    let key = normalize_name(language);
    if key.is_empty() {
        return Err(LanguageError::EmptyName);
    }
    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '+' | '#'))
        && !key.starts_with('-');
    if !valid {
        return Err(LanguageError::InvalidName(language.to_string()));
    }
    Ok(key)
}
