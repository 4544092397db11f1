//! Application context
//!
//! Every long-lived collaborator is built here, once, from the loaded
//! configuration and handed to the commands by reference.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use kedit_compiler_bridge::{AdbClient, CompilerBridge};
use kedit_core::{AppConfig, CompilationTracker, EventBus};
use kedit_editor::{EditorConfigApplier, FeatureFlags, LanguageConfigStore};

/// Shared state for one CLI invocation
pub struct AppContext {
    pub config: AppConfig,
    pub event_bus: Arc<EventBus>,
    pub tracker: Arc<CompilationTracker>,
    pub bridge: CompilerBridge,
    pub store: Arc<LanguageConfigStore>,
    pub applier: EditorConfigApplier,
    pub adb: AdbClient,
}

impl AppContext {
    /// Load the config from `config_path` (or the platform location) and
    /// wire everything up
    pub async fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => AppConfig::load_from(path).await?,
            None => AppConfig::load().await?,
        };
        Ok(Self::new(config))
    }

    pub fn new(config: AppConfig) -> Self {
        let event_bus = Arc::new(EventBus::new());
        let tracker = Arc::new(CompilationTracker::new(event_bus.clone()));
        let bridge = CompilerBridge::from_settings(&config.bridge, tracker.clone());

        let store = Arc::new(LanguageConfigStore::from_config(&config).with_event_bus(event_bus.clone()));
        let applier = EditorConfigApplier::new(store.clone())
            .with_defaults(FeatureFlags::from(&config.editor))
            .with_event_bus(event_bus.clone());

        let sdk_path = config.get_sdk_path();
        let adb = AdbClient::discover(sdk_path.as_deref());

        debug!(
            "Context ready: bridge {}, overrides in {:?}, adb {:?}",
            config.bridge.address(),
            store.override_dir(),
            adb.adb_path()
        );

        Self {
            config,
            event_bus,
            tracker,
            bridge,
            store,
            applier,
            adb,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_explicit_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.bridge.port = 9000;
        config.languages.override_dir = Some(dir.path().join("langs"));
        config.save_to(&path).await.unwrap();

        let ctx = AppContext::load(Some(path.as_path())).await.unwrap();
        assert_eq!(ctx.config.bridge.port, 9000);
        assert_eq!(ctx.store.override_dir(), dir.path().join("langs"));
        assert!(Arc::ptr_eq(&ctx.tracker, &ctx.bridge.tracker()));
    }
}
