//! Tempo Worker - Main entry point
//!
//! Runs queue workers and the job scheduler until SIGINT/SIGTERM.

use std::sync::Arc;

use tempo_core::{
    config::{Config, QueueBackendKind},
    jobs::{EchoJob, HandlerRegistry, HeartbeatJob, InMemoryQueue, JobWorker, NotificationHub, Queue, RedisQueue},
    schedule::{JobScheduler, ScheduleBuilder},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = match std::env::var("TEMPO_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    let metrics = telemetry::init_telemetry(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.queue.backend,
        workers = config.worker.workers,
        "Starting Tempo worker"
    );

    let queue: Arc<dyn Queue> = match config.queue.backend {
        QueueBackendKind::Memory => Arc::new(InMemoryQueue::new()),
        QueueBackendKind::Redis => {
            let queue = RedisQueue::connect(&config.redis.url, config.queue.namespace.clone())?;
            tracing::info!(url = %config.redis.url, namespace = %config.queue.namespace, "Redis queue configured");
            Arc::new(queue)
        }
    };

    let registry = Arc::new(HandlerRegistry::new());
    registry.register_job(EchoJob);

    let hub = Arc::new(NotificationHub::new());
    let worker = JobWorker::new(config.worker.clone()).start(queue, registry, hub);

    let scheduler = JobScheduler::new();
    if config.scheduler.enabled {
        if config.scheduler.heartbeat {
            let every_minute = ScheduleBuilder::new().minutely().at(0)?.build()?;
            scheduler.schedule(Arc::new(HeartbeatJob::new()), every_minute);
        }
        scheduler.start();
        tracing::info!(jobs = ?scheduler.job_names(), "Scheduler started");
    }

    shutdown_signal().await;

    scheduler.shutdown().await;
    let stats = worker.stats().clone();
    worker.shutdown_and_wait().await;

    tracing::info!(
        processed = stats.processed(),
        succeeded = stats.succeeded(),
        failed = stats.failed(),
        retried = stats.retried(),
        "Worker shutdown complete"
    );
    if metrics.is_enabled() {
        tracing::debug!(metrics = %metrics.render(), "Final metrics");
    }

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
