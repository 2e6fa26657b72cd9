//! Media pipeline worker binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use zyeute_media::{Downloader, DownloadConfig, MediaLimits};
use zyeute_queue::{JobQueue, ProgressChannel};
use zyeute_records::SupabaseRecords;
use zyeute_safety::SafetyClient;
use zyeute_storage::R2Client;
use zyeute_worker::stages::{FfmpegTransformer, ServiceSafetyGate, StoragePublisher};
use zyeute_worker::{
    DetachedTasks, HttpSideEffects, JobExecutor, PipelineContext, UndeterminedPolicy, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting zyeute-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if config.undetermined_policy == UndeterminedPolicy::Approve {
        warn!(
            "SAFETY_UNDETERMINED_POLICY=approve: content is published when the safety service cannot be reached"
        );
    }

    if let Some(port) = config.metrics_port {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to start Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let queue = JobQueue::from_env().context("failed to create job queue")?;
    queue.init().await.context("failed to initialize job queue")?;
    let progress = ProgressChannel::new(&queue.config().redis_url)?;

    let records = Arc::new(SupabaseRecords::from_env().context("record store configuration")?);
    let side_effects = HttpSideEffects::new(records.config(), records.clone())?;
    let storage = R2Client::from_env().context("object storage configuration")?;
    let safety = SafetyClient::from_env()?;
    let downloader = Downloader::new(DownloadConfig::from_env())?;

    let ctx = PipelineContext {
        transformer: Arc::new(FfmpegTransformer::new(
            downloader,
            MediaLimits::from_env(),
            config.ffmpeg_timeout,
        )
        .with_hls(config.hls_enabled)),
        gate: Arc::new(ServiceSafetyGate::new(safety)),
        publisher: Arc::new(StoragePublisher::new(Arc::new(storage))),
        store: records,
        notifier: Arc::new(progress),
        side_effects: Arc::new(side_effects),
        detached: DetachedTasks::new(config.detached_failure_log),
        config,
    };

    let executor = JobExecutor::new(Arc::new(queue), Arc::new(ctx));

    let shutdown = executor.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Received shutdown signal");
        shutdown.send(true).ok();
    });

    executor.run().await?;

    info!("Worker shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("zyeute=info".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.ok();
    }
}
