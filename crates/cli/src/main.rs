//! crewloop CLI, the main entry point.
//!
//! Commands:
//! - `run`     Run a team file on a task, streaming every message
//! - `check`   Validate a team file and show its participants
//! - `init`    Write a default config and a sample team file
//! - `config`  Show or validate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "crewloop",
    about = "crewloop: multi-agent turn-taking orchestrator",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a team on a task
    Run {
        /// Team file (TOML)
        team: PathBuf,

        /// The task; prompted for when omitted
        #[arg(short, long)]
        task: Option<String>,

        /// Root directory for the file_write tool
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,

        /// After each run, ask for a follow-up task and continue the session
        #[arg(short, long)]
        interactive: bool,
    },

    /// Validate a team file
    Check {
        /// Team file (TOML)
        team: PathBuf,
    },

    /// Write a default config and a sample team file
    Init,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = default_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            team,
            task,
            output_dir,
            json,
            interactive,
        } => {
            commands::run::run(commands::run::RunArgs {
                team,
                task,
                output_dir,
                json,
                interactive,
            })
            .await?
        }
        Commands::Check { team } => commands::check::run(&team).await?,
        Commands::Init => commands::init::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
    }

    Ok(())
}

/// Log level used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}
