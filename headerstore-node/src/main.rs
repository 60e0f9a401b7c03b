// Header-chain store CLI: init, replay, flush and inspect a headers.dat file.

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::NodeConfig;
use headerstore::{BlockStore, CheckpointTable, Hash256};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Header-chain store CLI", long_about = None)]
struct Args {
    /// Configuration file path.
    #[arg(short, long, default_value = "headerstore.toml")]
    config: PathBuf,

    /// Enable debug logging.
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open (creating if needed) the headers file and report the resulting
    /// chain state.
    Init,
    /// Print best hash, height, tip timestamp and genesis hash.
    Status,
    /// Feed a file of concatenated 80-byte headers through ingest, then
    /// flush the result.
    Ingest {
        /// Path to a file of raw, concatenated 80-byte headers.
        file: PathBuf,
    },
    /// Flush unwritten active entries to the log.
    Flush,
    /// Delete the headers file so the next init starts from empty.
    Zap,
    /// Print the hash and header fields at a given active-chain height.
    BlockAt { height: i32 },
    /// Print the peer-synchronization locator hashes for the current tip.
    Locator,
    /// Print up to 1,000 successor hashes following a given hash.
    NextHashes { hash: String },
    /// Run a foreground loop that flushes on `flush_interval_secs`, until
    /// interrupted (Ctrl-C).
    Run,
}

fn load_config(path: &PathBuf) -> anyhow::Result<NodeConfig> {
    if path.exists() {
        NodeConfig::load_from_file(path)
    } else {
        let config = NodeConfig::default();
        config.save_to_file(path)?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    use tracing_subscriber::EnvFilter;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = load_config(&args.config)?;
    let store_config = config.to_store_config();
    let checkpoints = CheckpointTable::for_network(config.network);

    if matches!(args.command, Command::Zap) {
        headerstore::zap(&store_config)?;
        info!("headers file removed");
        return Ok(());
    }

    let stop = AtomicBool::new(false);
    let store = BlockStore::init(&store_config, checkpoints, &stop).context("failed to open header store")?;

    match args.command {
        Command::Init => {
            println!("height={} best_hash={}", store.height(), store.best_hash());
        }
        Command::Status => {
            println!("height: {}", store.height());
            println!("best_hash: {}", store.best_hash());
            println!("timestamp: {}", store.timestamp());
            println!("genesis_hash: {}", store.genesis_hash());
        }
        Command::Ingest { file } => {
            let bytes = std::fs::read(&file)?;
            if bytes.len() % headerstore::HEADER_SIZE != 0 {
                anyhow::bail!(
                    "{} is not a multiple of {} bytes",
                    file.display(),
                    headerstore::HEADER_SIZE
                );
            }
            let mut accepted = 0usize;
            let mut orphaned = 0usize;
            for chunk in bytes.chunks(headerstore::HEADER_SIZE) {
                let mut record = [0u8; headerstore::HEADER_SIZE];
                record.copy_from_slice(chunk);
                let header = headerstore::BlockHeader::from_bytes(&record);
                let hash = header.hash();
                let (added, orphan) = store.add_header(header, hash);
                if added {
                    accepted += 1;
                }
                if orphan {
                    orphaned += 1;
                }
            }
            let flushed = store.flush()?;
            info!(accepted, orphaned, flushed, "ingest complete");
        }
        Command::Flush => {
            let flushed = store.flush()?;
            println!("flushed {flushed} headers");
        }
        Command::BlockAt { height } => match store.block_at(height) {
            Some((hash, header)) => println!("{hash} prev={} timestamp={}", header.prev_block, header.timestamp),
            None => {
                error!(height, "no active entry at that height");
                anyhow::bail!("no active entry at height {height}");
            }
        },
        Command::Locator => {
            for hash in store.locator_hashes() {
                println!("{hash}");
            }
        }
        Command::NextHashes { hash } => {
            let start = Hash256::from_hex(&hash)?;
            for hash in store.next_hashes(&start) {
                println!("{hash}");
            }
        }
        Command::Run => {
            info!(interval = config.flush_interval_secs, "entering flush loop (Ctrl-C to stop)");
            loop {
                std::thread::sleep(Duration::from_secs(config.flush_interval_secs));
                match store.flush() {
                    Ok(0) => {}
                    Ok(n) => info!(flushed = n, "periodic flush"),
                    Err(e) => error!(error = %e, "periodic flush failed"),
                }
            }
        }
        Command::Zap => unreachable!("handled before store init"),
    }

    store.shutdown().context("failed to shut down header store")?;
    Ok(())
}
