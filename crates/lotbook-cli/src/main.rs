//! Lotbook CLI - inspect and drive the offline field data layer
//!
//! `status` and `conflicts` read the local store; `sync` drains the
//! mutation queue against the configured remote API.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use lotbook_core::models::ConflictResolution;

mod commands;
mod error;

use error::CliError;

#[derive(Parser)]
#[command(name = "lotbook")]
#[command(about = "Offline field data and sync for construction quality management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to local database file
    #[arg(long, value_name = "PATH", global = true)]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending mutation counts and open conflicts
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drain the mutation queue against the remote API
    Sync,
    /// List open lot conflicts
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve an open lot conflict
    Resolve {
        /// Lot ID with the open conflict
        lot_id: String,
        /// Which version wins
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
    /// Destructively clear all offline data
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KeepSide {
    Local,
    Server,
    Merged,
}

impl From<KeepSide> for ConflictResolution {
    fn from(side: KeepSide) -> Self {
        match side {
            KeepSide::Local => Self::Local,
            KeepSide::Server => Self::Server,
            KeepSide::Merged => Self::Merged,
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Status { json } => commands::status::run_status(json, cli.db_path).await,
        Commands::Sync => commands::sync::run_sync(cli.db_path).await,
        Commands::Conflicts { json } => commands::conflicts::run_conflicts(json, cli.db_path).await,
        Commands::Resolve { lot_id, keep } => {
            commands::resolve::run_resolve(&lot_id, keep.into(), cli.db_path).await
        }
        Commands::Clear { yes } => commands::clear::run_clear(yes, cli.db_path).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
