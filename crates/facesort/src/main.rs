//! facesort - Auto-clustering photo organizer.
//!
//! facesort takes a directory of photos and sorts them into per-subject
//! folders, either by matching against a pre-registered roster or by
//! clustering on the fly from capture time and visual similarity.
//!
//! # Usage
//!
//! ```bash
//! # Sort against a known roster
//! facesort organize ./photos --mode database
//!
//! # Auto-cluster photos with no roster at all
//! facesort organize ./photos --mode auto-cluster
//!
//! # Manage the roster
//! facesort database
//!
//! # View configuration
//! facesort config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// facesort - Auto-clustering photo organizer.
#[derive(Parser, Debug)]
#[command(name = "facesort")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort a directory of photos, or reverse a previous run with --undo
    Organize(cli::organize::OrganizeArgs),

    /// Manage the subject roster used by database-matching mode
    Database(cli::database::DatabaseArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match facesort_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `facesort config path`."
            );
            facesort_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("facesort v{}", facesort_core::VERSION);

    match cli.command {
        Commands::Organize(args) => {
            let code = cli::organize::execute(args, config).await?;
            std::process::exit(code);
        }
        Commands::Database(args) => cli::database::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
