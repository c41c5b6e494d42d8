//! OrderIndex CLI.
//!
//! # Commands
//! ```text
//! orderindex run    --config <file.yaml> [--dry-run]
//! orderindex status --config <file.yaml>
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use orderindex_core::{
    ChainReader, CheckpointStore, EventSink, MemoryCheckpointStore, PollScheduler,
};
use orderindex_storage::{CollectorClient, InMemorySink, SqliteCheckpointStore};

mod config;
mod logging;

use config::{CheckpointBackend, FileConfig, NetworkConfig};

#[derive(Parser)]
#[command(
    name = "orderindex",
    about = "Replicates order-book contract events into the order aggregator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every configured network until interrupted
    Run {
        /// Path to the YAML config file
        #[arg(short, long)]
        config: PathBuf,
        /// Write to an in-memory sink instead of the collector
        #[arg(long)]
        dry_run: bool,
    },

    /// Print each network's checkpoint and chain height
    Status {
        /// Path to the YAML config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, dry_run } => cmd_run(&config, dry_run).await,
        Commands::Status { config } => cmd_status(&config).await,
    }
}

// ─── Backends ─────────────────────────────────────────────────────────────────

struct Backends {
    sink: Arc<dyn EventSink>,
    store: Arc<dyn CheckpointStore>,
    dry_run: Option<Arc<InMemorySink>>,
}

async fn checkpoint_store(
    cfg: &FileConfig,
    collector: Option<&Arc<CollectorClient>>,
) -> Result<Arc<dyn CheckpointStore>> {
    let store: Arc<dyn CheckpointStore> = match cfg.checkpoint.backend {
        CheckpointBackend::Collector => match collector {
            Some(client) => client.clone(),
            None => Arc::new(CollectorClient::new(&cfg.collector).context("collector")?),
        },
        CheckpointBackend::Sqlite => Arc::new(
            SqliteCheckpointStore::open(&cfg.checkpoint.path)
                .await
                .with_context(|| format!("opening {}", cfg.checkpoint.path))?,
        ),
        CheckpointBackend::Memory => Arc::new(MemoryCheckpointStore::new()),
    };
    Ok(store)
}

async fn backends(cfg: &FileConfig, dry_run: bool) -> Result<Backends> {
    if dry_run {
        // nothing leaves the process, checkpoints included
        let memory = Arc::new(InMemorySink::new());
        return Ok(Backends {
            sink: memory.clone(),
            store: memory.clone(),
            dry_run: Some(memory),
        });
    }
    let collector = Arc::new(CollectorClient::new(&cfg.collector).context("collector")?);
    let store = checkpoint_store(cfg, Some(&collector)).await?;
    Ok(Backends {
        sink: collector,
        store,
        dry_run: None,
    })
}

/// Fail fast when a node is unreachable or serves another chain.
async fn probe(net: &NetworkConfig) -> Result<u64> {
    let chain_id = net.indexer.chain_id;
    let reader = net.builder().reader()?;
    let reported = reader
        .chain_id()
        .await
        .with_context(|| format!("chain {chain_id}: probing {}", net.rpc))?;
    if i64::try_from(reported).ok() != Some(chain_id) {
        bail!("chain {chain_id}: {} reports chain id {reported}", net.rpc);
    }
    let height = reader
        .current_height()
        .await
        .with_context(|| format!("chain {chain_id}: reading height"))?;
    Ok(height)
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn cmd_run(path: &Path, dry_run: bool) -> Result<()> {
    let cfg = FileConfig::load(path)?;
    logging::init_tracing(&cfg.log);

    for net in &cfg.networks {
        let height = probe(net).await?;
        info!(chain_id = net.indexer.chain_id, height, "chain reachable");
    }

    let backends = backends(&cfg, dry_run).await?;
    let cancel = CancellationToken::new();

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            on_signal.cancel();
        }
    });

    let mut tasks = JoinSet::new();
    for net in &cfg.networks {
        let controller = net
            .builder()
            .build(backends.sink.clone(), backends.store.clone())
            .with_context(|| format!("chain {}", net.indexer.chain_id))?;
        let mut scheduler = PollScheduler::new(
            controller,
            net.indexer.poll_interval(),
            net.indexer.backoff(),
        );
        let token = cancel.clone();
        let chain_id = net.indexer.chain_id;
        tasks.spawn(async move { (chain_id, scheduler.run(&token).await) });
    }
    info!(networks = cfg.networks.len(), dry_run, "indexer started");

    let mut failure = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((chain_id, Err(e))) => {
                error!(chain_id, error = %e, "indexer stopped");
                failure.get_or_insert_with(|| format!("chain {chain_id}: {e}"));
                cancel.cancel();
            }
            Err(e) => {
                error!(error = %e, "indexer task panicked");
                failure.get_or_insert_with(|| e.to_string());
                cancel.cancel();
            }
        }
    }

    if let Some(memory) = backends.dry_run {
        info!(
            orders = memory.order_count(),
            matches = memory.match_count(),
            writes = memory.write_count(),
            "dry run finished"
        );
    }
    match failure {
        Some(msg) => bail!(msg),
        None => Ok(()),
    }
}

async fn cmd_status(path: &Path) -> Result<()> {
    let cfg = FileConfig::load(path)?;
    logging::init_tracing(&cfg.log);
    let store = checkpoint_store(&cfg, None).await?;

    println!("{:<12} {:<44} {:>12} {:>12} {:>8}", "CHAIN", "CONTRACT", "CHECKPOINT", "HEIGHT", "LAG");
    for net in &cfg.networks {
        let key = net.indexer.source_key();
        let checkpoint = store
            .load(&key)
            .await
            .with_context(|| format!("loading checkpoint for {key}"))?
            .map(|c| c.last_block);
        let height = net
            .builder()
            .reader()?
            .current_height()
            .await
            .with_context(|| format!("chain {}: reading height", key.chain_id))?;

        let (shown, lag) = match checkpoint {
            Some(block) => (block.to_string(), height.saturating_sub(block).to_string()),
            None => ("-".to_string(), "-".to_string()),
        };
        println!(
            "{:<12} {:<44} {:>12} {:>12} {:>8}",
            key.chain_id, key.contract, shown, height, lag
        );
    }
    Ok(())
}
