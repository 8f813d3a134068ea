// Copyright 2025 Cowboy AI, LLC.

//! cim-aggregation CLI - fetch a customer with their purchase transactions.

use anyhow::{Context, Result};
use cim_aggregation::{AggregationConfig, CustomerAggregationService, RecoveryPolicy};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "cim-aggregation")]
#[command(author = "The Cowboy AI")]
#[command(version)]
#[command(about = "Concurrent customer aggregation with selectable recovery policies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file; defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker pool size, overriding the configuration
    #[arg(long, global = true)]
    pool_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate one customer and print it as JSON
    Fetch {
        /// Customer id
        #[arg(value_parser = clap::value_parser!(i64).range(1..))]
        key: i64,

        /// Recovery policy name or route slug
        #[arg(short, long, default_value = "using-exceptionally")]
        policy: RecoveryPolicy,

        /// Force the transaction lookup to fail instead of deriving it from the key
        #[arg(long, action = ArgAction::Set)]
        force_failure: Option<bool>,
    },

    /// List recovery policies and their route slugs
    Policies,

    /// Print the effective configuration
    Config,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn load_config(cli: &Cli) -> Result<AggregationConfig> {
    let mut config = match &cli.config {
        Some(path) => AggregationConfig::load(path)
            .with_context(|| format!("Failed to load config from {path:?}"))?,
        None => AggregationConfig::default(),
    };

    if let Some(size) = cli.pool_size {
        config.pool.size = Some(size);
        config.validate().context("Invalid --pool-size")?;
    }

    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Policies => {
            for policy in RecoveryPolicy::ALL {
                println!("{:<32}{}", policy.name(), policy.route());
            }
        }

        Commands::Config => {
            let rendered = config
                .to_toml_string()
                .context("Failed to render configuration")?;
            println!("{rendered}");
        }

        Commands::Fetch {
            key,
            policy,
            force_failure,
        } => {
            let service = CustomerAggregationService::from_config(&config)
                .context("Failed to start aggregation service")?;
            debug!(?service, "Service ready");

            let response = match force_failure {
                Some(force) => service
                    .pool()
                    .block_on(service.get_with_forced_failure(key, policy, force)),
                None => service.get_blocking(key, policy),
            }
            .with_context(|| format!("Failed to aggregate customer {key} using {policy}"))?;

            let json =
                serde_json::to_string_pretty(&response).context("Failed to serialize response")?;
            println!("{json}");
        }
    }

    Ok(())
}
