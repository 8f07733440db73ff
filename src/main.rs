use clap::{Parser, Subcommand};
use rdsharvest::config::resolve_config_path;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rdsharvest")]
#[command(about = "Harvests rotated RDS audit logs into hourly S3 objects", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise logging to debug regardless of the configured level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every rotated log file newer than the checkpoint
    Run {
        /// Start from the beginning and keep checkpoint and records in memory
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file
    Init {
        #[arg(long)]
        stdout: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run { dry_run }) => {
            let config_path = resolve_config_path(cli.config.as_deref());
            rdsharvest::cli::run::run(config_path, cli.debug, dry_run).await?;
        }
        None => {
            // Default behavior is to run
            let config_path = resolve_config_path(cli.config.as_deref());
            rdsharvest::cli::run::run(config_path, cli.debug, false).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                rdsharvest::cli::config::init(stdout)?;
            }
        },
    }

    Ok(())
}
