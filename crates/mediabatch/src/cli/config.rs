//! The `mediabatch config` command for configuration management.

use clap::{Args, Subcommand};
use mediabatch_core::Config;
use std::path::PathBuf;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Check a config file (defaults to the standard location)
    Validate {
        /// Config file to check
        path: Option<PathBuf>,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", Config::default_path().display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();
            init(&path, force)?;
            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }

        ConfigCommand::Validate { path } => {
            let path = path.unwrap_or_else(Config::default_path);
            let checked = validate(&path)?;
            println!(
                "{} is valid ({} extension profile(s), default mode {})",
                path.display(),
                checked.extensions.len(),
                checked.batch.mode
            );
        }
    }

    Ok(())
}

fn init(path: &std::path::Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(())
}

fn validate(path: &std::path::Path) -> anyhow::Result<Config> {
    if !path.exists() {
        anyhow::bail!("No config file at {}", path.display());
    }
    Ok(Config::load_from(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        init(&path, false).unwrap();
        assert!(validate(&path).is_ok());
        assert!(init(&path, false).is_err());
        init(&path, true).unwrap();
    }

    #[test]
    fn validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\nslice_ms = \"fast\"\n").unwrap();
        assert!(validate(&path).is_err());
        assert!(validate(&dir.path().join("missing.toml")).is_err());
    }
}
