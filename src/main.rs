use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paylink::application::engine::PayLinkEngine;
use paylink::config::LedgerConfig;
use paylink::domain::ports::LedgerStoreRef;
use paylink::infrastructure::in_memory::{InMemoryDirectory, InMemoryStore};
use paylink::interfaces::batch::ScriptRunner;
use paylink::interfaces::csv::link_writer::LinkWriter;
use paylink::interfaces::csv::script_reader::ScriptReader;
use paylink::telemetry;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input script CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Overrides PAYLINK_MAX_RETRIES.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Overrides PAYLINK_HASH_COST.
    #[arg(long)]
    hash_cost: Option<u32>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(cli: &Cli, config: &LedgerConfig) -> Result<LedgerStoreRef> {
    use paylink::infrastructure::rocksdb::RocksDBStore;

    match &cli.db_path {
        Some(db_path) => {
            let store = RocksDBStore::open_with_lock_timeout(db_path, config.lock_timeout())?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout()))),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(_cli: &Cli, config: &LedgerConfig) -> Result<LedgerStoreRef> {
    Ok(Arc::new(InMemoryStore::with_lock_timeout(config.lock_timeout())))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.json_logs);

    let mut config = LedgerConfig::from_env()?;
    if let Some(max_retries) = cli.max_retries {
        config.max_retries = max_retries;
    }
    if let Some(hash_cost) = cli.hash_cost {
        config.hash_cost = hash_cost;
    }

    let store = open_store(&cli, &config)?;
    let directory = InMemoryDirectory::new();
    let engine = PayLinkEngine::new(store, Arc::new(directory.clone()), config);
    let runner = ScriptRunner::new(engine, directory);

    let file = File::open(&cli.input).into_diagnostic()?;
    for (index, row) in ScriptReader::new(file).rows().enumerate() {
        // Line 1 is the header.
        let line = index + 2;
        match row {
            Ok(row) => {
                if let Err(e) = runner.apply(row).await {
                    eprintln!("Error on line {line}: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading line {line}: {e}");
            }
        }
    }

    let links = runner.engine().active_links().await?;
    let stdout = io::stdout();
    let mut writer = LinkWriter::new(stdout.lock());
    writer.write_links(links)?;

    Ok(())
}
