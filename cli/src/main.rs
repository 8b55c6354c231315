//! utxoindex CLI: inspect configuration and indexer state.
//!
//! Usage:
//! ```bash
//! utxoindex check-config ./indexer.json
//! utxoindex status --db ./utxos.db
//! utxoindex info
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use utxoindex_core::{AddressFilter, CaptureMode, IndexerConfig};

#[derive(Parser)]
#[command(
    name = "utxoindex",
    about = "Confirmation-aware UTXO indexer: UtxoIndex CLI",
    version
)]
struct Cli {
    /// Log level when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show defaults and available storage backends
    Info,

    /// Load and validate a JSON indexer configuration
    #[command(name = "check-config")]
    CheckConfig {
        /// Path to the configuration file
        path: PathBuf,
    },

    /// Show the confirmed position and UTXO counts of a SQLite store
    Status {
        /// Path to the SQLite database
        #[arg(long)]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::CheckConfig { path } => {
            tracing::debug!(path = %path.display(), "loading config");
            let config = IndexerConfig::from_file(&path)
                .with_context(|| format!("invalid config {}", path.display()))?;
            println!("{}", describe(&config)?);
        }
        Commands::Status { db } => cmd_status(&db).await?,
    }
    Ok(())
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("UtxoIndex v{}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Default confirmation depth: {} blocks",
        defaults.confirmation_block_count
    );
    println!("  Default address check: {}", defaults.address_check);
    println!("  Storage backends: memory, SQLite (feature: sqlite)");
}

/// One-paragraph summary of a validated configuration.
fn describe(config: &IndexerConfig) -> Result<String> {
    let filter = AddressFilter::new(
        config.addresses_of_interest.iter().cloned(),
        config.address_check,
    )?;
    let watched = if filter.is_wildcard() {
        "all addresses".to_string()
    } else {
        format!("{} address(es)", config.addresses_of_interest.len())
    };
    let start = match &config.starting_block_point {
        Some(p) => format!("slot {} / block {}", p.block_slot, p.block_number),
        None => "origin".to_string(),
    };
    let capture = match CaptureMode::from_keep_all(config.keep_all_tx_outputs_in_db) {
        CaptureMode::AllOutputs => "all outputs",
        CaptureMode::Interest if config.address_check.inputs() => "outputs of interest",
        CaptureMode::Interest => "nothing (inputs not checked)",
    };

    Ok(format!(
        "config ok\n  start: {start}\n  confirmation depth: {}\n  watching: {watched} ({})\n  storing: {capture}",
        config.confirmation_block_count, config.address_check
    ))
}

#[cfg(feature = "sqlite")]
async fn cmd_status(db: &str) -> Result<()> {
    use utxoindex_core::UtxoStore;
    use utxoindex_storage::SqliteUtxoStore;

    tracing::debug!(db, "opening store");
    let store = SqliteUtxoStore::open(db)
        .await
        .with_context(|| format!("cannot open {db}"))?;

    match store.latest_block_point().await? {
        Some(p) => println!(
            "latest confirmed: slot {} block {} hash {}",
            p.block_slot,
            p.block_number,
            p.hash_hex()
        ),
        None => println!("latest confirmed: none"),
    }
    println!("unspent outputs:  {}", store.utxo_count().await?);
    println!("confirmed blocks: {}", store.confirmed_block_count().await?);
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
async fn cmd_status(_db: &str) -> Result<()> {
    anyhow::bail!("status needs the `sqlite` feature")
}
