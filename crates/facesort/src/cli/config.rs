//! The `facesort config` command for configuration management.

use clap::{Args, Subcommand};
use facesort_core::Config;

const REDACTED_PLACEHOLDER: &str = "***redacted***";

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show {
        /// Print the vision backend's API key instead of redacting it
        #[arg(long)]
        show_secrets: bool,
    },

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show { show_secrets } => {
            let mut config = Config::load()?;
            if !show_secrets && !config.vision.api_key.is_empty() {
                config.vision.api_key = REDACTED_PLACEHOLDER.to_string();
            }
            let toml = config.to_toml()?;
            println!("{}", toml);
            if !show_secrets {
                println!("# vision.api_key redacted; pass --show-secrets to print it");
            }
        }

        ConfigCommand::Path => {
            let path = Config::default_path();
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();

            if path.exists() && !force {
                anyhow::bail!(
                    "config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            // Ensure parent directory exists
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            // Write default config
            let config = Config::default();
            let toml = config.to_toml()?;
            std::fs::write(&path, toml)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}
