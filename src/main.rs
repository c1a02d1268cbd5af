use std::sync::Arc;
use std::time::Duration;

use tavush::application::ports::{BlobStore, ChunkRepository, JobQueue, JobRepository};
use tavush::application::services::{
    ChunkDriver, JobOrchestrator, RetryPolicy, TranscriptionWorker, WebhookNotifier,
};
use tavush::config::{Environment, Settings};
use tavush::infrastructure::audio::{check_ffmpeg_binary, FfmpegChunker, FfmpegNormalizer};
use tavush::infrastructure::observability::{init_tracing, TracingConfig};
use tavush::infrastructure::persistence::{
    create_pool, run_migrations, PgChunkRepository, PgJobRepository,
};
use tavush::infrastructure::providers::default_registry;
use tavush::infrastructure::queue::InMemoryJobQueue;
use tavush::infrastructure::storage::BlobStoreFactory;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(anyhow::Error::msg)?;

    let settings = Settings::load(environment)?;

    init_tracing(TracingConfig {
        environment: environment.to_string(),
        json_format: settings.logging.enable_json,
    });

    check_ffmpeg_binary().map_err(|e| anyhow::anyhow!(e))?;

    let pool = create_pool(&settings.database).await?;
    if settings.database.run_migrations {
        tracing::info!("Running database migrations");
        run_migrations(&pool).await?;
    }

    let jobs: Arc<dyn JobRepository> = Arc::new(PgJobRepository::new(pool.clone()));
    let chunks: Arc<dyn ChunkRepository> = Arc::new(PgChunkRepository::new(pool));
    let blobs: Arc<dyn BlobStore> = BlobStoreFactory::create(&settings.storage)?;
    let queue: Arc<dyn JobQueue> = Arc::new(InMemoryJobQueue::new());
    let providers = Arc::new(default_registry(&settings.providers));

    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::clone(&jobs),
        Arc::clone(&chunks),
        Arc::clone(&blobs),
        Arc::clone(&queue),
        settings.worker.stale_job_minutes,
    ));

    // Fail zombie jobs from crashed workers, then requeue pending work.
    orchestrator.recover_on_startup().await?;

    let webhook = Arc::new(WebhookNotifier::new(
        Arc::clone(&jobs),
        Duration::from_secs(settings.worker.webhook_timeout_seconds),
    ));

    let mut handles = Vec::with_capacity(settings.worker.concurrency);
    for _ in 0..settings.worker.concurrency {
        let driver = ChunkDriver::new(
            Arc::clone(&jobs),
            Arc::clone(&chunks),
            RetryPolicy::new(&settings.retry),
            settings.chunking.coverage_gap_threshold,
            Duration::from_secs(settings.worker.provider_timeout_seconds),
        );

        let worker = Arc::new(TranscriptionWorker::new(
            Arc::clone(&queue),
            Arc::clone(&jobs),
            Arc::clone(&chunks),
            Arc::clone(&blobs),
            Arc::new(FfmpegNormalizer),
            Arc::new(FfmpegChunker::new(settings.chunking.clone())),
            Arc::clone(&providers),
            driver,
            Some(Arc::clone(&webhook)),
            settings.chunking.clone(),
        ));

        handles.push(tokio::spawn(worker.run()));
    }

    tracing::info!(
        workers = settings.worker.concurrency,
        "Transcription workers running"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    for handle in handles {
        handle.abort();
    }

    Ok(())
}
