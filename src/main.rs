// ABOUTME: CLI entry point for binlog-replicator
// ABOUTME: Parses commands and routes to appropriate handlers

use anyhow::Context;
use binlog_replicator::{commands, config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "binlog-replicator")]
#[command(
    about = "MySQL-to-MySQL binlog shipping for instances without native replication",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    /// Path to the replication config file
    #[arg(long, global = true, default_value = "replication.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drop and recreate the synthetic test schema on the master
    SeedMaster {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
    /// Insert synthetic write traffic into the master table
    GenerateMasterData {
        /// Number of insert batches to run
        #[arg(long, default_value_t = 1000)]
        batches: u64,
        /// Rows inserted per batch
        #[arg(long, default_value_t = 100)]
        rows_per_batch: u64,
    },
    /// Snapshot the master onto the slave and record the starting checkpoint
    SeedSlave {
        /// Overwrite an existing checkpoint and re-seed from a fresh snapshot
        #[arg(long)]
        force: bool,
    },
    /// Continuously ship binlog segments from master to slave
    StartReplication {
        /// Run a single shipping cycle and exit
        #[arg(long)]
        once: bool,
        /// Seconds to sleep between cycles (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    // 3. Default to "info" if neither are provided
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = config::load(&cli.config)
        .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

    match cli.command {
        Commands::SeedMaster { yes } => commands::seed_master(&config, yes).await,
        Commands::GenerateMasterData {
            batches,
            rows_per_batch,
        } => commands::generate(&config, batches, rows_per_batch).await,
        Commands::SeedSlave { force } => commands::seed_slave(&config, force).await,
        Commands::StartReplication { once, interval } => {
            commands::start_replication(&config, once, interval).await
        }
    }
}
