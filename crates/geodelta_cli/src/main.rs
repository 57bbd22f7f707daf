//! geodelta CLI
//!
//! Detects and merges new features between two geospatial snapshots.
//!
//! # Commands
//!
//! - `detect` - Report collections with new features, changing nothing
//! - `sync` - Merge new features into the initial snapshot
//! - `inspect` - List the collections of a snapshot
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::RunArgs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Geospatial snapshot synchronization.
#[derive(Parser)]
#[command(name = "geodelta")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report collections with new features without changing anything
    Detect(RunArgs),

    /// Merge new features from the latest snapshot into the initial one
    Sync(RunArgs),

    /// List the collections of a snapshot
    Inspect {
        /// Snapshot directory
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Detect(args) => commands::detect::run(&args)?,
        Commands::Sync(args) => commands::sync::run(&args)?,
        Commands::Inspect { path, format } => commands::inspect::run(&path, &format)?,
        Commands::Version => {
            println!("geodelta CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("geodelta core v{}", geodelta_core::VERSION);
            println!(
                "Snapshot format v{}.{}",
                geodelta_storage::CURRENT_FORMAT_VERSION.0,
                geodelta_storage::CURRENT_FORMAT_VERSION.1
            );
        }
    }

    Ok(())
}
