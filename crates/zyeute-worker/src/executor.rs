//! Job executor.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use zyeute_queue::{Delivery, JobBroker};

use crate::error::WorkerResult;
use crate::orchestrator::{Disposition, JobReport, Orchestrator, PipelineContext};

/// Pulls jobs from the broker and runs them on a bounded pool.
pub struct JobExecutor {
    broker: Arc<dyn JobBroker>,
    orchestrator: Orchestrator,
    job_semaphore: Arc<Semaphore>,
    limiter: Arc<DefaultDirectRateLimiter>,
    shutdown: watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    pub fn new(broker: Arc<dyn JobBroker>, ctx: Arc<PipelineContext>) -> Self {
        let config = &ctx.config;
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let starts = NonZeroU32::new(config.max_starts_per_sec).unwrap_or(NonZeroU32::MIN);
        let limiter = Arc::new(RateLimiter::direct(Quota::per_second(starts)));
        let (shutdown, _) = watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            broker,
            orchestrator: Orchestrator::new(ctx),
            job_semaphore,
            limiter,
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Sender that stops [`JobExecutor::run`] when `true` is sent.
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown.clone()
    }

    /// Consume jobs until shutdown, then wait for in-flight work.
    pub async fn run(&self) -> WorkerResult<()> {
        let config = &self.orchestrator.context().config;
        info!(
            "Starting job executor '{}' with {} max concurrent jobs",
            self.consumer_name, config.max_concurrent_jobs
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                permit = Arc::clone(&self.job_semaphore).acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            tokio::select! {
                _ = shutdown_rx.changed() => continue,
                _ = self.limiter.until_ready() => {}
            }

            let delivery = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                result = self.broker.dequeue(&self.consumer_name, config.poll_block) => result,
            };

            match delivery {
                Ok(Some(delivery)) => {
                    let orchestrator = self.orchestrator.clone();
                    let broker = Arc::clone(&self.broker);
                    tokio::spawn(async move {
                        let _permit = permit;
                        let report = orchestrator.run(&delivery).await;
                        settle(broker.as_ref(), &delivery, &report).await;
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Error consuming jobs: {}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Shutdown signal received, waiting for in-flight jobs");
        let slots = u32::try_from(config.max_concurrent_jobs).unwrap_or(u32::MAX);
        match tokio::time::timeout(config.shutdown_timeout, self.job_semaphore.acquire_many(slots)).await {
            Ok(_) => info!("All in-flight jobs finished"),
            Err(_) => warn!(
                "In-flight jobs still running after {:?}; their deliveries will be redelivered",
                config.shutdown_timeout
            ),
        }

        if !self.orchestrator.context().detached.drain(config.shutdown_timeout).await {
            warn!("Detached tasks still running at shutdown");
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Dequeue and run a single job inline.
    pub async fn process_next(&self) -> WorkerResult<Option<JobReport>> {
        let block = self.orchestrator.context().config.poll_block;
        let Some(delivery) = self.broker.dequeue(&self.consumer_name, block).await? else {
            return Ok(None);
        };
        let report = self.orchestrator.run(&delivery).await;
        settle(self.broker.as_ref(), &delivery, &report).await;
        Ok(Some(report))
    }
}

/// Apply the orchestrator's decision to the broker.
async fn settle(broker: &dyn JobBroker, delivery: &Delivery, report: &JobReport) {
    let result = match &report.disposition {
        Disposition::Ack => broker.ack(delivery).await,
        Disposition::Retry(delay) => broker.retry(delivery, *delay).await,
        Disposition::DeadLetter(reason) => broker.dead_letter(delivery, reason).await,
    };

    match result {
        Ok(()) => debug!(
            job_id = %report.job_id,
            outcome = report.outcome.as_str(),
            "Delivery settled"
        ),
        Err(e) => error!(
            job_id = %report.job_id,
            "Failed to settle delivery, it will be redelivered: {}", e
        ),
    }
}
