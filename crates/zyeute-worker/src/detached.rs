//! Fire-and-forget tasks.
//!
//! Best-effort work (transcription requests, automated comments) runs here so
//! it can never fail or delay the job that triggered it. Failures and panics
//! are logged, counted, and kept in a bounded in-memory log.

use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::metrics::record_detached_failure;

/// A detached task that did not finish successfully.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: &'static str,
    pub error: String,
    pub at: DateTime<Utc>,
}

struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
    failures: Mutex<VecDeque<TaskFailure>>,
    capacity: usize,
}

/// Spawner for tasks nobody awaits.
#[derive(Clone)]
pub struct DetachedTasks {
    inner: Arc<Inner>,
}

impl DetachedTasks {
    /// `capacity` bounds the failure log.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                failures: Mutex::new(VecDeque::new()),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Spawn `fut` without waiting for it.
    pub fn spawn<F, E>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        inner.in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            match tokio::spawn(fut).await {
                Ok(Ok(())) => debug!(task, "Detached task finished"),
                Ok(Err(e)) => {
                    warn!(task, "Detached task failed: {}", e);
                    inner.record(task, e.to_string());
                }
                Err(e) if e.is_panic() => {
                    error!(task, "Detached task panicked");
                    inner.record(task, "panicked".to_string());
                }
                Err(e) => {
                    warn!(task, "Detached task cancelled: {}", e);
                    inner.record(task, e.to_string());
                }
            }

            if inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                inner.idle.notify_waiters();
            }
        });
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Most recent failures, oldest first.
    pub fn failures(&self) -> Vec<TaskFailure> {
        match self.inner.failures.lock() {
            Ok(log) => log.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Wait for outstanding tasks. Returns `false` if `timeout` elapsed first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl Inner {
    fn record(&self, task: &'static str, error: String) {
        record_detached_failure(task);
        let mut log = match self.failures.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        if log.len() == self.capacity {
            log.pop_front();
        }
        log.push_back(TaskFailure {
            task,
            error,
            at: Utc::now(),
        });
    }
}
