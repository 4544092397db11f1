//! Application Configuration
//!
//! Manages KEdit settings:
//! - Desktop bridge endpoint, timeouts and polling
//! - Editor fallback defaults
//! - Language override location
//! - ADB location

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use directories::ProjectDirs;
use tracing::{info, debug};

use crate::error::{KEditError, Result};

/// Desktop bridge connection and polling settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeSettings {
    /// Host the bridge listens on (reached through an ADB port mapping)
    pub host: String,
    /// TCP port of the bridge
    pub port: u16,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Timeout for reading the single response line, in milliseconds
    pub read_timeout_ms: u64,
    /// Delay between two STATUS polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum number of STATUS polls before giving up
    pub max_poll_attempts: u32,
    /// Overall wall-clock limit for one compilation, in seconds
    pub compile_timeout_secs: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            poll_interval_ms: 1_000,
            max_poll_attempts: 60,
            compile_timeout_secs: 120,
        }
    }
}

impl BridgeSettings {
    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    /// Reject settings that would make the poller meaningless
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(KEditError::Config("bridge.host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(KEditError::Config("bridge.port must not be 0".into()));
        }
        if self.max_poll_attempts == 0 {
            return Err(KEditError::Config("bridge.max_poll_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

/// Editor settings used when a language configuration cannot be applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EditorDefaults {
    /// Tab size
    pub tab_size: u32,
    /// Use spaces instead of tabs
    pub use_spaces: bool,
    /// Show line numbers
    pub show_line_numbers: bool,
    /// Enable word wrap
    pub word_wrap: bool,
    /// Highlight matching brackets
    pub highlight_brackets: bool,
    /// Highlight the line holding the cursor
    pub highlight_current_line: bool,
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            tab_size: 4,
            use_spaces: true,
            show_line_numbers: true,
            word_wrap: false,
            highlight_brackets: true,
            highlight_current_line: true,
        }
    }
}

/// Where user language overrides live
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LanguageSettings {
    /// Override directory; the platform data dir is used when unset
    pub override_dir: Option<PathBuf>,
}

/// ADB settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdbSettings {
    /// Path to Android SDK (platform-tools/adb is used from there)
    pub sdk_path: Option<PathBuf>,
    /// Device serial to target when several are attached
    pub serial: Option<String>,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration version
    pub version: u32,
    /// Desktop bridge settings
    pub bridge: BridgeSettings,
    /// Editor fallback settings
    pub editor: EditorDefaults,
    /// Language configuration settings
    pub languages: LanguageSettings,
    /// ADB settings
    pub adb: AdbSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bridge: BridgeSettings::default(),
            editor: EditorDefaults::default(),
            languages: LanguageSettings::default(),
            adb: AdbSettings::default(),
        }
    }
}

impl AppConfig {
    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("com", "kedit", "KEdit")
    }

    /// Get the configuration directory path
    pub fn config_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the configuration file path
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.data_dir().to_path_buf())
    }

    /// Directory holding user language overrides
    pub fn language_override_dir(&self) -> PathBuf {
        self.languages.override_dir.clone().unwrap_or_else(|| {
            Self::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("languages")
        })
    }

    /// Load configuration from the platform config file, creating it when absent
    pub async fn load() -> Result<Self> {
        let config_file = Self::config_file()
            .ok_or_else(|| KEditError::Config("Cannot determine config path".into()))?;
        Self::load_from(&config_file).await
    }

    /// Load configuration from an explicit path, creating it when absent
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            debug!("Loading config from {:?}", path);
            let contents = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&contents)?;
            config.bridge.validate()?;
            Ok(config)
        } else {
            info!("Config file not found at {:?}, using defaults", path);
            let config = AppConfig::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    /// Save configuration to the platform config file
    pub async fn save(&self) -> Result<()> {
        let config_file = Self::config_file()
            .ok_or_else(|| KEditError::Config("Cannot determine config path".into()))?;
        self.save_to(&config_file).await
    }

    /// Save configuration to an explicit path
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        debug!("Config saved to {:?}", path);
        Ok(())
    }

    /// Get Android SDK path, with auto-detection
    pub fn get_sdk_path(&self) -> Option<PathBuf> {
        self.adb.sdk_path.clone()
            .or_else(|| std::env::var_os("ANDROID_HOME").map(PathBuf::from))
            .or_else(|| {
                let candidates = if cfg!(windows) {
                    vec![dirs::data_local_dir().map(|d| d.join("Android").join("Sdk"))]
                } else if cfg!(target_os = "macos") {
                    vec![dirs::home_dir().map(|h| h.join("Library").join("Android").join("sdk"))]
                } else {
                    vec![
                        dirs::home_dir().map(|h| h.join("Android").join("Sdk")),
                        Some(PathBuf::from("/usr/lib/android-sdk")),
                    ]
                };

                candidates.into_iter()
                    .flatten()
                    .find(|p| p.exists())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.bridge.port, 8765);
        assert_eq!(config.bridge.address(), "127.0.0.1:8765");
        assert_eq!(config.bridge.poll_interval(), Duration::from_secs(1));
        assert!(config.editor.use_spaces);
    }

    #[test]
    fn test_partial_toml_takes_defaults() {
        let config: AppConfig = toml::from_str("[bridge]\nport = 9000\n").unwrap();
        assert_eq!(config.bridge.port, 9000);
        assert_eq!(config.bridge.max_poll_attempts, 60);
        assert_eq!(config.editor.tab_size, 4);
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut settings = BridgeSettings::default();
        settings.max_poll_attempts = 0;
        assert!(matches!(settings.validate(), Err(KEditError::Config(_))));
    }

    #[tokio::test]
    async fn test_load_creates_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let created = AppConfig::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(created, AppConfig::default());

        let mut changed = created.clone();
        changed.bridge.port = 9999;
        changed.languages.override_dir = Some(dir.path().join("langs"));
        changed.save_to(&path).await.unwrap();

        let loaded = AppConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded.bridge.port, 9999);
        assert_eq!(loaded.language_override_dir(), dir.path().join("langs"));
    }
}
