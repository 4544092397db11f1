//! KEdit command line
//!
//! Talks to the desktop compiler bridge and manages editor language
//! configurations.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use kedit::commands::{
    CompileCommand, DevicesCommand, HighlightCommand, LangAction, LangCommand, PingCommand, ReverseCommand,
    StatusCommand,
};
use kedit::context::AppContext;
use kedit::{APP_NAME, VERSION};

#[derive(Parser, Debug)]
#[command(name = "kedit", version, about = "KEdit desktop bridge and language tooling")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the desktop bridge is reachable
    Ping,
    /// Upload a Kotlin or Java file and compile it
    Compile { file: PathBuf },
    /// Show the bridge's status for a request id
    Status { id: String },
    /// Manage language configurations
    Lang {
        #[command(subcommand)]
        action: LangCli,
    },
    /// List attached Android devices
    Devices,
    /// Expose the bridge port on a device via `adb reverse`
    Reverse {
        #[arg(short, long)]
        serial: Option<String>,
        /// Remove the mapping instead
        #[arg(long)]
        remove: bool,
    },
    /// Print a file with editor highlighting
    Highlight { file: PathBuf },
}

#[derive(Subcommand, Debug)]
enum LangCli {
    /// List bundled and overridden languages
    List,
    /// Print the effective configuration
    Show { language: String },
    /// Delete the user override
    Reset { language: String },
    /// Save the effective configuration as an editable override
    Export { language: String },
}

impl From<LangCli> for LangAction {
    fn from(cli: LangCli) -> Self {
        match cli {
            LangCli::List => LangAction::List,
            LangCli::Show { language } => LangAction::Show { language },
            LangCli::Reset { language } => LangAction::Reset { language },
            LangCli::Export { language } => LangAction::Export { language },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("{} v{} starting", APP_NAME, VERSION);

    let ctx = AppContext::load(cli.config.as_deref()).await?;

    let outcome = match cli.command {
        Command::Ping => PingCommand.execute(&ctx).await,
        Command::Compile { file } => CompileCommand { file }.execute(&ctx).await,
        Command::Status { id } => StatusCommand { id }.execute(&ctx).await,
        Command::Lang { action } => LangCommand { action: action.into() }.execute(&ctx).await,
        Command::Devices => DevicesCommand.execute(&ctx).await,
        Command::Reverse { serial, remove } => ReverseCommand { serial, remove }.execute(&ctx).await,
        Command::Highlight { file } => HighlightCommand { file }.execute(&ctx).await,
    };

    if let Err(e) = &outcome {
        error!("{:#}", e);
    }
    outcome
}
