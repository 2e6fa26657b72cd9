//! In-process broker with the same delivery semantics as the Redis queue.
//!
//! Used by tests and by single-process deployments that do not need
//! durability across restarts.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};

use zyeute_models::JobId;

use crate::broker::{Delivery, JobBroker};
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

/// A job that was given up on.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub job: QueueJob,
    pub reason: String,
    pub attempts: u32,
}

#[derive(Default)]
struct State {
    ready: VecDeque<QueueJob>,
    delayed: Vec<(Instant, QueueJob)>,
    in_flight: HashMap<String, (Instant, QueueJob)>,
    attempts: HashMap<JobId, u32>,
    seen: HashSet<String>,
    dead: Vec<DeadLetter>,
}

impl State {
    /// Move due retries and expired deliveries back to the ready queue.
    fn release_due(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].0 <= now {
                let (_, job) = self.delayed.swap_remove(i);
                self.ready.push_back(job);
            } else {
                i += 1;
            }
        }

        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, (deadline, _))| *deadline <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();
        for receipt in expired {
            if let Some((_, job)) = self.in_flight.remove(&receipt) {
                debug!(job_id = %job.job_id(), "Redelivering job past its visibility timeout");
                self.ready.push_front(job);
            }
        }
    }

    fn next_wakeup(&self) -> Option<Instant> {
        self.delayed
            .iter()
            .map(|(at, _)| *at)
            .chain(self.in_flight.values().map(|(deadline, _)| *deadline))
            .min()
    }
}

/// In-memory [`JobBroker`].
pub struct MemoryQueue {
    state: Mutex<State>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a panicking test thread; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Dead letters recorded so far.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead.clone()
    }

    /// Deliveries handed out for a job that is still live.
    pub fn attempts(&self, job_id: &JobId) -> u32 {
        self.lock().attempts.get(job_id).copied().unwrap_or(0)
    }

    /// Deliveries currently held by workers.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    fn settle(&self, delivery: &Delivery) -> QueueResult<QueueJob> {
        let mut state = self.lock();
        state
            .in_flight
            .remove(&delivery.receipt)
            .map(|(_, job)| job)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.receipt.clone()))
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(900))
    }
}

#[async_trait]
impl JobBroker for MemoryQueue {
    async fn enqueue(&self, job: QueueJob) -> QueueResult<JobId> {
        job.validate()?;
        let job_id = job.job_id().clone();
        {
            let mut state = self.lock();
            if !state.seen.insert(job.idempotency_key()) {
                return Err(QueueError::Duplicate(job.idempotency_key()));
            }
            state.ready.push_back(job);
        }
        self.notify.notify_one();
        Ok(job_id)
    }

    async fn dequeue(&self, _consumer: &str, block: Duration) -> QueueResult<Option<Delivery>> {
        let give_up_at = Instant::now() + block;

        loop {
            let notified = self.notify.notified();
            let wake_at = {
                let now = Instant::now();
                let mut state = self.lock();
                state.release_due(now);

                if let Some(job) = state.ready.pop_front() {
                    let receipt = uuid::Uuid::new_v4().to_string();
                    let attempt = {
                        let count = state.attempts.entry(job.job_id().clone()).or_insert(0);
                        *count += 1;
                        *count
                    };
                    state
                        .in_flight
                        .insert(receipt.clone(), (now + self.visibility_timeout, job.clone()));
                    return Ok(Some(Delivery {
                        receipt,
                        job,
                        attempt,
                    }));
                }

                if now >= give_up_at {
                    return Ok(None);
                }
                state
                    .next_wakeup()
                    .map_or(give_up_at, |at| at.min(give_up_at))
            };

            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let job = self.settle(delivery)?;
        self.lock().attempts.remove(job.job_id());
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()> {
        let job = self.settle(delivery)?;
        self.lock().delayed.push((Instant::now() + delay, job));
        self.notify.notify_one();
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let job = self.settle(delivery)?;
        warn!("Moved job {} to DLQ: {}", job.job_id(), reason);
        let mut state = self.lock();
        let attempts = state.attempts.remove(job.job_id()).unwrap_or(delivery.attempt);
        state.dead.push(DeadLetter {
            job,
            reason: reason.to_string(),
            attempts,
        });
        Ok(())
    }

    async fn len(&self) -> QueueResult<u64> {
        let state = self.lock();
        Ok((state.ready.len() + state.delayed.len()) as u64)
    }

    async fn dead_letter_len(&self) -> QueueResult<u64> {
        Ok(self.lock().dead.len() as u64)
    }
}
