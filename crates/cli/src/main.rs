//! Cloud Dashboard CLI
//!
//! Queries idle detection and optimizer results from a running dashboard,
//! and trains model artifacts locally.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{detection, model, optimize};
use std::path::PathBuf;

/// Cloud Dashboard CLI
#[derive(Parser)]
#[command(name = "dashctl")]
#[command(author, version, about = "CLI for the Cloud Dashboard", long_about = None)]
pub struct Cli {
    /// API endpoint URL (falls back to the config file, then http://localhost:8000)
    #[arg(long, env = "DASHCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show idle resources
    Idle {
        /// Score a freshly generated synthetic batch instead of the test partition
        #[arg(long)]
        live: bool,
    },

    /// Get cluster-based optimization recommendations
    Optimize {
        /// JSON array of resource records to optimize instead of the test partition
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show model lifecycle status
    Status,

    /// Train model artifacts locally from a telemetry CSV
    Train {
        /// Retrain even when valid artifacts exist
        #[arg(long)]
        force: bool,

        /// Cleaned telemetry CSV
        #[arg(long)]
        telemetry: Option<PathBuf>,

        /// Artifact store directory
        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        /// Generations kept on disk
        #[arg(long, default_value_t = 3)]
        keep: usize,

        /// Seed for the split and clustering
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Manage CLI defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the current configuration
    Show,

    /// Update configuration values
    Set {
        #[arg(long)]
        api_url: Option<String>,

        #[arg(long)]
        artifact_dir: Option<PathBuf>,

        #[arg(long)]
        telemetry: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        let unavailable = e
            .downcast_ref::<client::ClientError>()
            .map(|c| c.is_model_unavailable())
            .unwrap_or(false);
        if unavailable {
            output::print_info("No trained model on the server; run `dashctl train` against its artifact directory");
        }
        if verbose {
            eprintln!("{:?}", e);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::Config::load()?;
    let api_url = config.resolve_api_url(cli.api_url.as_deref());

    if cli.verbose {
        output::print_info(&format!("Using API at {}", api_url));
    }

    match cli.command {
        Commands::Idle { live } => {
            let client = client::ApiClient::new(&api_url)?;
            if live {
                detection::show_live(&client, cli.format).await?;
            } else {
                detection::show_idle(&client, cli.format).await?;
            }
        }
        Commands::Optimize { file } => {
            let client = client::ApiClient::new(&api_url)?;
            optimize::optimize(&client, file.as_deref(), cli.format).await?;
        }
        Commands::Status => {
            let client = client::ApiClient::new(&api_url)?;
            model::show_status(&client, cli.format).await?;
        }
        Commands::Train {
            force,
            telemetry,
            artifact_dir,
            keep,
            seed,
        } => {
            let options = model::TrainOptions {
                telemetry_path: telemetry
                    .or_else(|| config.telemetry_path.clone())
                    .unwrap_or_else(|| PathBuf::from("cleaned_vm_data.csv")),
                artifact_dir: artifact_dir
                    .or_else(|| config.artifact_dir.clone())
                    .unwrap_or_else(|| PathBuf::from("artifacts")),
                generations_to_keep: keep,
                seed,
                force,
            };
            model::train(options, cli.format).await?;
        }
        Commands::Config(ConfigCommands::Show) => {
            output::print_json(&config)?;
        }
        Commands::Config(ConfigCommands::Set {
            api_url,
            artifact_dir,
            telemetry,
        }) => {
            if let Some(url) = api_url {
                url::Url::parse(&url)?;
                config.api_url = Some(url);
            }
            if artifact_dir.is_some() {
                config.artifact_dir = artifact_dir;
            }
            if telemetry.is_some() {
                config.telemetry_path = telemetry;
            }
            let path = config.save()?;
            output::print_success(&format!("Saved {}", path.display()));
        }
    }

    Ok(())
}
