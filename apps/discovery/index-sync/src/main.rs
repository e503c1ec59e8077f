//! Index Sync
//!
//! Copies review embeddings from the geo store into the vector index, either as
//! a resumable one-off backfill or by following the change feed.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use database::mongodb::connect_from_config_with_retry;
use domain_discovery::embedding::OllamaEmbeddingGateway;
use domain_discovery::mongodb::{MongoCheckpointStore, MongoGeoStore};
use domain_discovery::qdrant::QdrantVectorIndex;
use domain_discovery::{
    BackfillRunner, DiscoveryError, ResumeStrategy, StreamingIndexer, SyncConfig,
};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "index-sync")]
#[command(about = "Keep the review vector index in step with the geo store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and index every existing review, resuming where the last run stopped
    Backfill {
        /// Reviews per batch. Overrides SYNC_BATCH_SIZE.
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Pause between batches in milliseconds. Overrides SYNC_PACE_MS.
        #[arg(short, long)]
        pace_ms: Option<u64>,

        /// Where to resume: checkpoint or index-count. Overrides SYNC_RESUME_STRATEGY.
        #[arg(short, long)]
        strategy: Option<ResumeStrategy>,
    },

    /// Follow the change feed and index new reviews until interrupted
    Stream,
}

fn apply_overrides(
    mut sync: SyncConfig,
    batch_size: Option<usize>,
    pace_ms: Option<u64>,
    strategy: Option<ResumeStrategy>,
) -> Result<SyncConfig> {
    if let Some(batch_size) = batch_size {
        if batch_size == 0 {
            eyre::bail!("--batch-size must be at least 1");
        }
        sync.batch_size = batch_size;
    }
    if let Some(pace_ms) = pace_ms {
        sync.pace = Duration::from_millis(pace_ms);
    }
    if let Some(strategy) = strategy {
        sync.resume_strategy = strategy;
    }
    Ok(sync)
}

/// Flips to true on SIGINT/SIGTERM.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        axum_helpers::shutdown_signal().await;
        info!("shutdown requested, finishing current batch");
        let _ = tx.send(true);
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;
    init_tracing(&config.environment);

    let cli = Cli::parse();

    info!(database = %config.geo.database(), "connecting to geo store");
    let client = connect_from_config_with_retry(&config.geo, None)
        .await
        .wrap_err("geo store unreachable")?;
    let geo = MongoGeoStore::new(client, config.geo.database());
    let checkpoints = Arc::new(MongoCheckpointStore::new(geo.database()));
    let geo = Arc::new(geo);

    let embedder = Arc::new(OllamaEmbeddingGateway::new(config.ollama.clone())?);
    let index = Arc::new(QdrantVectorIndex::new(&config.qdrant)?);

    let shutdown = shutdown_channel();

    match cli.command {
        Commands::Backfill {
            batch_size,
            pace_ms,
            strategy,
        } => {
            let sync = apply_overrides(config.sync.clone(), batch_size, pace_ms, strategy)?;
            info!(
                batch_size = sync.batch_size,
                pace_ms = sync.pace.as_millis() as u64,
                strategy = %sync.resume_strategy,
                "starting backfill"
            );

            let runner = BackfillRunner::new(geo, embedder, index, checkpoints, sync);
            match runner.run(shutdown).await {
                Ok(report) => {
                    if report.gap() > 0 {
                        warn!(gap = report.gap(), "vector index is missing reviews");
                    }
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                Err(DiscoveryError::SyncStall {
                    processed,
                    resume_from,
                    reason,
                }) => {
                    error!(processed, resume_from = %resume_from, reason = %reason, "backfill stalled");
                    eyre::bail!(
                        "backfill stalled after {processed} records; rerun to continue from {resume_from}"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Stream => {
            info!("following the review change feed");
            let indexer = StreamingIndexer::new(geo, embedder, index, checkpoints);
            let stats = indexer.run(shutdown).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
