//! Broker contract shared by the Redis and in-process queues.

use std::time::Duration;

use async_trait::async_trait;

use zyeute_models::JobId;

use crate::error::QueueResult;
use crate::job::QueueJob;

/// A job handed to a worker.
///
/// The receipt identifies this delivery to the broker; a delivery that is
/// neither acked, retried, nor dead-lettered before the visibility timeout
/// is redelivered.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receipt: String,
    pub job: QueueJob,
    /// 1-based count of deliveries of this job, including this one.
    pub attempt: u32,
}

impl Delivery {
    pub fn job_id(&self) -> &JobId {
        self.job.job_id()
    }
}

/// At-least-once job broker.
#[async_trait]
pub trait JobBroker: Send + Sync {
    /// Validate and enqueue a job.
    async fn enqueue(&self, job: QueueJob) -> QueueResult<JobId>;

    /// Wait up to `block` for the next job.
    async fn dequeue(&self, consumer: &str, block: Duration) -> QueueResult<Option<Delivery>>;

    /// Mark the delivery done. The job will not be seen again.
    async fn ack(&self, delivery: &Delivery) -> QueueResult<()>;

    /// Hand the job back for another attempt after `delay`.
    async fn retry(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()>;

    /// Move the job to the dead letter queue.
    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()>;

    /// Jobs waiting to be delivered (ready and delayed).
    async fn len(&self) -> QueueResult<u64>;

    async fn dead_letter_len(&self) -> QueueResult<u64>;
}
