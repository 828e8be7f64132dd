//! vnlab - Entry Point
//!
//! Builds and manages virtual lab deployments on a libvirt host, either
//! directly from the command line or through the REST daemon.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::debug;

use vnlab::app::state::AppState;
use vnlab::logs::{init_logging, LogLevel, LogOptions};
use vnlab::models::kind::ResourceKind;
use vnlab::orchestrator::{Target, Verb};
use vnlab::storage::layout::{StorageLayout, DEFAULT_BASE_DIR};
use vnlab::storage::settings::Settings;
use vnlab::utils::assert_root;

mod commands;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIME"),
    ")"
);

#[derive(Parser)]
#[command(name = "vnlab")]
#[command(about = "Declarative virtual labs on QEMU/KVM")]
#[command(version, long_version = LONG_VERSION)]
struct Cli {
    /// State directory holding settings, catalog, images and machines
    #[arg(long, global = true, default_value = DEFAULT_BASE_DIR)]
    state_dir: PathBuf,

    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a deployment from a YAML or JSON template
    Build {
        /// Template path
        template: PathBuf,
    },

    /// Start a host or every host of a deployment
    Start { kind: TargetKind, name: String },

    /// Gracefully shut down a host or every host of a deployment
    Stop { kind: TargetKind, name: String },

    /// Reboot a host or every host of a deployment
    Restart { kind: TargetKind, name: String },

    /// Destroy a host, a network or a whole deployment
    Destroy { kind: DestroyKind, name: String },

    /// List cataloged resources
    Get { listing: commands::get::Listing },

    /// Remove backend objects left behind by interrupted builds
    Reconcile,

    /// Run the REST daemon
    Serve,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetKind {
    Host,
    Deployment,
}

impl From<TargetKind> for ResourceKind {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Host => ResourceKind::Host,
            TargetKind::Deployment => ResourceKind::Deployment,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DestroyKind {
    Host,
    Network,
    Deployment,
}

impl From<DestroyKind> for ResourceKind {
    fn from(kind: DestroyKind) -> Self {
        match kind {
            DestroyKind::Host => ResourceKind::Host,
            DestroyKind::Network => ResourceKind::Network,
            DestroyKind::Deployment => ResourceKind::Deployment,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let layout = StorageLayout::new(&cli.state_dir);
    let mut settings = Settings::load_or_default(&layout.settings_file()).await?;
    if let Some(level) = cli.log_level {
        settings.log_level = level;
    }
    if cli.json_logs {
        settings.log_json = true;
    }

    // Held until exit so buffered file logs get flushed
    let _log_guard = init_logging(LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings
            .log_to_file
            .then(|| layout.logs_dir().path().to_path_buf()),
        json_format: settings.log_json,
    })?;

    if settings.require_root {
        assert_root().await?;
    }

    debug!("Using state directory {}", layout.base_dir.display());
    let state = Arc::new(AppState::init(settings, layout).await?);

    match cli.command {
        Commands::Build { template } => commands::build::run(&state, &template).await,
        Commands::Start { kind, name } => {
            commands::lifecycle::run(&state, Verb::Start, Target::new(kind.into(), name)).await
        }
        Commands::Stop { kind, name } => {
            commands::lifecycle::run(&state, Verb::Stop, Target::new(kind.into(), name)).await
        }
        Commands::Restart { kind, name } => {
            commands::lifecycle::run(&state, Verb::Restart, Target::new(kind.into(), name)).await
        }
        Commands::Destroy { kind, name } => {
            commands::lifecycle::run(&state, Verb::Destroy, Target::new(kind.into(), name)).await
        }
        Commands::Get { listing } => commands::get::run(&state, listing).await,
        Commands::Reconcile => commands::reconcile::run(&state).await,
        Commands::Serve => commands::serve::run(state).await,
    }
}
