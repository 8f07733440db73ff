use crate::aws::{dynamodb_client, load_sdk_config, s3_client};
use crate::catalog::LogCatalog;
use crate::config::parse::{load_config, ConfigError};
use crate::config::types::{Config, LogLevel};
use crate::download::RotationSafeDownloader;
use crate::processor::{Processor, RunError, RunSummary};
use crate::remote::{LogSource, RdsLogSource, RemoteError, SourceReadiness};
use crate::storage::dynamodb::DynamoDbCheckpointStore;
use crate::storage::memory::{MemoryCheckpointStore, MemoryOutputSink};
use crate::storage::s3::S3OutputSink;
use crate::storage::{CheckpointManager, CheckpointStore, OutputSink};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("could not set up RDS client: {0}")]
    Setup(#[from] RemoteError),

    #[error(transparent)]
    Run(#[from] RunError),
}

pub async fn run(
    config_path: Option<PathBuf>,
    debug: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/rdsharvest/config.yml");
            eprintln!("  /etc/rdsharvest/config.yml");
            eprintln!("\nUse --config <path> to specify a config file, or run 'rdsharvest config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_harvest(&config_path, debug, dry_run)
        .await
        .map_err(|e| e.into())
}

async fn run_harvest(config_path: &Path, debug: bool, dry_run: bool) -> Result<(), CommandError> {
    let config = load_config(config_path)?;

    let level = if debug { LogLevel::Debug } else { config.log_level };
    super::init_tracing(level);
    info!(config_path = %config_path.display(), "Loaded configuration");

    let sdk_config = load_sdk_config(&config.aws).await;
    let source = Arc::new(RdsLogSource::new(
        &sdk_config,
        config.aws.endpoint.as_deref(),
        config.harvest.download_timeout,
    )?);

    if dry_run {
        info!("Dry run: checkpoint and records stay in memory");
        let sink = Arc::new(MemoryOutputSink::new(config.output_prefix()));
        let summary = build_processor(
            &config,
            source,
            Arc::new(MemoryCheckpointStore::default()),
            sink.clone(),
        )
        .run()
        .await?;

        print_summary(&summary);
        for (key, body) in sink.objects() {
            println!("  would write s3://{}/{} ({} bytes)", config.output.bucket, key, body.len());
        }
        return Ok(());
    }

    let store = Arc::new(DynamoDbCheckpointStore::new(
        dynamodb_client(&sdk_config),
        &config.checkpoint.table_name,
    ));
    let sink = Arc::new(S3OutputSink::new(
        s3_client(&sdk_config, config.aws.endpoint.is_some()),
        &config.output.bucket,
        config.output_prefix(),
    ));

    let summary = build_processor(&config, source, store, sink).run().await?;
    print_summary(&summary);

    Ok(())
}

/// Wires a processor for the configured source from its collaborators.
pub fn build_processor<S>(
    config: &Config,
    source: Arc<S>,
    store: Arc<dyn CheckpointStore>,
    sink: Arc<dyn OutputSink>,
) -> Processor
where
    S: LogSource + SourceReadiness + 'static,
{
    let catalog = LogCatalog::new(
        source.clone(),
        &config.source.log_file_prefix,
        config.harvest.listing_retries,
    );
    let downloader = RotationSafeDownloader::new(
        catalog,
        source.clone(),
        config.harvest.max_retries,
        config.harvest.read_retry_backoff,
    );
    let checkpoints = CheckpointManager::new(
        store,
        &config.source.instance_identifier,
        &config.source.category,
    );

    Processor::new(
        &config.source.instance_identifier,
        source,
        downloader,
        checkpoints,
        sink,
    )
}

fn print_summary(summary: &RunSummary) {
    println!(
        "Processed {} records from {} log files, checkpoint at {}",
        summary.records_processed, summary.files_processed, summary.watermark
    );
}
