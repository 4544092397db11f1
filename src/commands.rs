//! CLI commands for KEdit
//!
//! Each command works against the collaborators in [`AppContext`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};

use kedit_core::{CompilationResult, Event, EventSubscription};
use kedit_editor::GrammarLanguage;

use crate::context::AppContext;
use crate::terminal::TerminalSurface;

const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// Check that the desktop bridge answers
pub struct PingCommand;

impl PingCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let address = ctx.config.bridge.address();
        let outcome = ctx.bridge.ping().await;

        if !outcome.success {
            bail!("Bridge at {} is not reachable: {}", address, outcome.error_text());
        }
        println!("Bridge at {} answered {}", address, outcome.output.as_deref().unwrap_or_default());
        Ok(())
    }
}

/// Upload a source file and compile it
pub struct CompileCommand {
    pub file: PathBuf,
}

impl CompileCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let filename = file_name(&self.file)?;
        let source = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        // Print progress as the tracker publishes it
        let events = ctx.event_bus.subscribe();
        let compile = ctx.bridge.compile_source(&filename, &source);
        tokio::pin!(compile);
        let result = loop {
            tokio::select! {
                result = &mut compile => break result,
                _ = tokio::time::sleep(PROGRESS_TICK) => print_progress(&events),
            }
        };
        print_progress(&events);

        match &result {
            CompilationResult::Success { warnings, .. } => {
                println!("{}", result.summary());
                for warning in warnings {
                    println!("  {}", warning);
                }
                Ok(())
            }
            CompilationResult::Error { details, errors, .. } => {
                if errors.is_empty() && !details.is_empty() {
                    eprintln!("{}", details);
                }
                for error in errors {
                    eprintln!("  {}", error);
                }
                match result.to_error() {
                    Some(e) if e.is_recoverable() => bail!("{} (the request can be retried)", e.user_message()),
                    Some(e) => bail!("{}", e.user_message()),
                    None => bail!("{}", result.summary()),
                }
            }
        }
    }
}

/// Query the bridge for one request's status
pub struct StatusCommand {
    pub id: String,
}

impl StatusCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let status = ctx
            .bridge
            .status(&self.id)
            .await
            .map_err(|outcome| anyhow!("Status query failed: {}", outcome.error_text()))?;

        println!("Request {}: {:?}", self.id, status.state);
        if !status.output_path.is_empty() {
            println!("  output:   {}", status.output_path);
            println!("  duration: {} ms", status.duration.as_millis());
        }
        if !status.error_message.is_empty() {
            println!("  error:    {}", status.error_message);
        }
        if !status.error_details.is_empty() {
            println!("{}", status.error_details);
        }
        Ok(())
    }
}

/// Language configuration management
pub struct LangCommand {
    pub action: LangAction,
}

pub enum LangAction {
    List,
    Show { language: String },
    Reset { language: String },
    Export { language: String },
}

impl LangCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let store = &ctx.store;

        match &self.action {
            LangAction::List => {
                for name in store.list_languages().await? {
                    let config = match store.load(&name).await {
                        Ok(config) => config,
                        Err(e) => {
                            warn!("Skipping {}: {}", name, e);
                            continue;
                        }
                    };
                    let marker = if store.has_override(&name).await { " (override)" } else { "" };
                    println!(
                        "  {:<12} {:<12} {}{}",
                        name,
                        config.display_name,
                        config.file_extensions.join(", "),
                        marker
                    );
                }
            }
            LangAction::Show { language } => {
                let config = store.try_load(language).await?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            LangAction::Reset { language } => {
                if store.reset(language).await? {
                    println!("Removed override for {}", language);
                } else {
                    println!("{} has no override", language);
                }
            }
            LangAction::Export { language } => {
                let config = store.load(language).await?;
                let path = store.save(&config).await?;
                println!("Wrote {}", path.display());
            }
        }

        Ok(())
    }
}

/// List attached devices
pub struct DevicesCommand;

impl DevicesCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let devices = ctx.adb.list_devices().await?;

        if devices.is_empty() {
            println!("No devices connected");
        } else {
            println!("Connected devices:");
            for device in devices {
                println!("  {} - {}", device.display_name(), device.state.as_str());
            }
        }

        Ok(())
    }
}

/// Map the bridge port onto a device's loopback
pub struct ReverseCommand {
    pub serial: Option<String>,
    pub remove: bool,
}

impl ReverseCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let port = ctx.config.bridge.port;
        let serial = self.serial.as_deref().or(ctx.config.adb.serial.as_deref());

        if self.remove {
            ctx.adb.remove_reverse(serial, port).await?;
            println!("Removed reverse mapping for tcp:{}", port);
        } else {
            let device = ctx.adb.expose_bridge(serial, port).await?;
            println!("{} now reaches the bridge on tcp:{}", device.display_name(), port);
        }
        Ok(())
    }
}

/// Print a file with the editor's highlighting
pub struct HighlightCommand {
    pub file: PathBuf,
}

impl HighlightCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let text = tokio::fs::read_to_string(&self.file)
            .await
            .with_context(|| format!("Failed to read {}", self.file.display()))?;

        let language = self.language(ctx).await?;
        info!("Highlighting {} as {}", self.file.display(), language);

        let mut surface = TerminalSurface::new();
        let applied = ctx.applier.apply(&language, &mut surface).await;
        if applied.fallback {
            warn!(
                "Using plain configuration for {}: {}",
                language,
                applied.reason.as_deref().unwrap_or("unknown reason")
            );
        }

        print!("{}", surface.render(&text));
        Ok(())
    }

    async fn language(&self, ctx: &AppContext) -> Result<String> {
        let extension = self
            .file
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| anyhow!("{} has no extension", self.file.display()))?;

        if let Some(language) = ctx.store.language_for_extension(extension).await? {
            return Ok(language);
        }
        Ok(GrammarLanguage::from_extension(extension)
            .map(|g| g.name().to_string())
            .unwrap_or_else(|| extension.to_ascii_lowercase()))
    }
}

fn print_progress(events: &EventSubscription) {
    for event in events.drain() {
        if let Event::CompilationStateChanged(state) = event {
            println!("... {}", state.label());
        }
    }
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} is not a file path", path.display()))
}
