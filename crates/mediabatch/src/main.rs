//! Mediabatch CLI - batch rename and post-process photos and videos.
//!
//! Mediabatch groups related media files (a raw image with its JPEG, the
//! parts of a panorama), checks them for leftovers and pending work, and
//! then renames every group by a name template or only runs the decided
//! actions.
//!
//! # Usage
//!
//! ```bash
//! # Number the groups in a directory: "Beach 001.jpg", "Beach 002.jpg", ...
//! mediabatch rename ~/Pictures/beach --mode group
//!
//! # Show the plan without touching anything
//! mediabatch rename ~/Pictures/pano --mode panorama --dry-run
//!
//! # Convert lone raw files and rotate images, nothing renamed
//! mediabatch postprocess ~/Pictures/import -a only-raw=convert
//!
//! # View configuration
//! mediabatch config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// Mediabatch - batch rename and post-process photos and videos.
#[derive(Parser, Debug)]
#[command(name = "mediabatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "MEDIABATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Rename files by group using a preset
    Rename(cli::run::RenameArgs),

    /// Run the post-processing checks and actions without renaming
    Postprocess(cli::run::PostprocessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

fn load_config(path: Option<&std::path::Path>) -> mediabatch_core::Config {
    let loaded = match path {
        Some(path) => mediabatch_core::Config::load_from(path),
        None => mediabatch_core::Config::load(),
    };
    match loaded {
        Ok(config) => config,
        Err(e) => {
            // Logging is not initialized yet.
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `mediabatch config validate`."
            );
            mediabatch_core::Config::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Mediabatch v{}", mediabatch_core::VERSION);

    match cli.command {
        Commands::Rename(args) => cli::run::execute_rename(args, config).await,
        Commands::Postprocess(args) => cli::run::execute_postprocess(args, config).await,
        Commands::Config(args) => cli::config::execute(args, &config).await,
    }
}
