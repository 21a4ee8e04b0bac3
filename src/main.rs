//! Chain Automation - cycle-driven uploads, swaps and liquidity provisioning
//!
//! # WARNING
//! - Outside `--dry-run` every cycle signs real transactions from the configured wallet.
//! - Keep the wallet funded for gas; failed preflights are reported, not retried.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

// Use the library crate
use chain_automation::cli::commands;
use chain_automation::config::Config;

/// Chain Automation - randomized, cycle-driven ledger activity
#[derive(Parser)]
#[command(name = "automation")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the automation loop
    Start {
        /// Run against an in-memory ledger (no real transactions)
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the configured feature inventory
    Status,

    /// Show current configuration (secrets masked)
    Config,

    /// Check system health (gateway, wallet, notifications)
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_tracing("info", false);
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level, config.logging.json);
    info!("Configuration loaded from {}", cli.config);

    // Execute command
    let result = match cli.command {
        Commands::Start { dry_run } => commands::start(&config, dry_run).await,
        Commands::Status => commands::status(&config).await,
        Commands::Config => commands::show_config(&config),
        Commands::Health => commands::health(&config).await,
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Install the global subscriber; `RUST_LOG` still overrides the configured level
fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        format!("chain_automation={}", level)
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
