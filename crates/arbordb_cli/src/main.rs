//! ArborDB CLI
//!
//! Runs the ArborDB server and maintains its journal files.
//!
//! # Commands
//!
//! - `serve` - Run the HTTP server
//! - `inspect` - Display journal statistics per realm
//! - `dump` - Print a realm as JSON
//! - `compact` - Rewrite a journal to reclaim space

mod commands;

use anyhow::Context;
use arbordb_core::DEFAULT_DOMAIN_PREFIX;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ArborDB server and journal tools.
#[derive(Parser)]
#[command(name = "arbordb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the journal file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server until Ctrl-C
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Display journal statistics per realm
    Inspect {
        /// Domain prefix of realms
        #[arg(long, default_value = DEFAULT_DOMAIN_PREFIX)]
        prefix: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a realm as JSON
    Dump {
        /// Realm (database id) to dump
        realm: String,

        /// Domain prefix of realms
        #[arg(long, default_value = DEFAULT_DOMAIN_PREFIX)]
        prefix: String,
    },

    /// Rewrite the journal so it holds only live entries
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { config } => commands::serve::run(config.as_deref()).await?,
        Commands::Inspect { prefix, format } => {
            let path = cli.path.context("journal path required for inspect")?;
            commands::inspect::run(&path, &prefix, &format)?;
        }
        Commands::Dump { realm, prefix } => {
            let path = cli.path.context("journal path required for dump")?;
            commands::dump::run(&path, &prefix, &realm)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.context("journal path required for compact")?;
            commands::compact::run(&path, dry_run)?;
        }
        Commands::Version => {
            println!("ArborDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("ArborDB Core v{}", arbordb_core::VERSION);
        }
    }

    Ok(())
}
