//! Job queue using Redis Streams.
//!
//! Layout:
//! - `{stream}`: ready jobs, consumed through a consumer group
//! - `{stream}:delayed`: sorted set of payloads waiting for their retry time
//! - `{dlq}`: dead letters with the failure reason
//! - `zyeute:attempts:{job_id}`: delivery counter
//!
//! Entries left pending longer than the visibility timeout are claimed by
//! the next consumer that asks for work.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use zyeute_models::JobId;

use crate::broker::{Delivery, JobBroker};
use crate::error::{QueueError, QueueResult};
use crate::job::QueueJob;

const ATTEMPTS_TTL_SECS: i64 = 86_400;
const PROMOTE_BATCH: usize = 100;

/// Moves due payloads from the delayed set back onto the stream.
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, payload in ipairs(due) do
    redis.call('ZREM', KEYS[1], payload)
    redis.call('XADD', KEYS[2], '*', 'job', payload)
end
return #due
"#;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for jobs
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Pending entries idle longer than this are redelivered
    pub visibility_timeout: Duration,
    /// TTL of the enqueue dedup key
    pub dedup_ttl: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "zyeute:jobs".to_string(),
            consumer_group: "zyeute:workers".to_string(),
            dlq_stream_name: "zyeute:dlq".to_string(),
            visibility_timeout: Duration::from_secs(900),
            dedup_ttl: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: std::env::var("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP")
                .unwrap_or(defaults.consumer_group),
            dlq_stream_name: std::env::var("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            visibility_timeout: std::env::var("QUEUE_VISIBILITY_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
            dedup_ttl: std::env::var("QUEUE_DEDUP_TTL")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedup_ttl),
        }
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.stream_name)
    }
}

fn attempts_key(job_id: &JobId) -> String {
    format!("zyeute:attempts:{}", job_id)
}

fn dedup_key(idempotency_key: &str) -> String {
    format!("zyeute:dedup:{}", idempotency_key)
}

/// Redis Streams job queue.
pub struct JobQueue {
    client: redis::Client,
    config: QueueConfig,
    promote: redis::Script,
}

impl JobQueue {
    /// Create a new job queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self {
            client,
            config,
            promote: redis::Script::new(PROMOTE_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    async fn conn(&self) -> QueueResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| QueueError::connection_failed(e.to_string()))
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;

        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Round-trip check used by the self-check binary.
    pub async fn ping(&self) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn promote_due(&self, conn: &mut MultiplexedConnection) -> QueueResult<()> {
        let promoted: u64 = self
            .promote
            .key(self.config.delayed_key())
            .key(&self.config.stream_name)
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(conn)
            .await?;
        if promoted > 0 {
            debug!("Promoted {} delayed jobs", promoted);
        }
        Ok(())
    }

    /// Claim one entry whose consumer went quiet for longer than the visibility timeout.
    async fn claim_expired(
        &self,
        conn: &mut MultiplexedConnection,
        consumer: &str,
    ) -> QueueResult<Option<StreamId>> {
        let idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(idle_ms)
            .arg("-")
            .arg("+")
            .arg(1)
            .query_async(conn)
            .await?;

        let Some(stale) = pending.ids.first() else {
            return Ok(None);
        };

        let claimed: StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg(idle_ms)
            .arg(&stale.id)
            .query_async(conn)
            .await?;

        if let Some(entry) = claimed.ids.into_iter().next() {
            info!(
                message_id = %entry.id,
                previous_consumer = %stale.consumer,
                times_delivered = stale.times_delivered,
                "Reclaimed job past its visibility timeout"
            );
            return Ok(Some(entry));
        }
        Ok(None)
    }

    async fn read_new(
        &self,
        conn: &mut MultiplexedConnection,
        consumer: &str,
        block: Duration,
    ) -> QueueResult<Option<StreamId>> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer)
            .arg("COUNT")
            .arg(1)
            .arg("BLOCK")
            .arg(block.as_millis() as u64)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">")
            .query_async(conn)
            .await?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|k| k.ids.into_iter().next()))
    }

    /// Remove a message from the stream.
    async fn remove(&self, conn: &mut MultiplexedConnection, message_id: &str) -> QueueResult<()> {
        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;

        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(conn)
            .await?;
        Ok(())
    }

    async fn push_dead_letter(
        &self,
        conn: &mut MultiplexedConnection,
        message_id: &str,
        payload: &str,
        reason: &str,
    ) -> QueueResult<()> {
        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg("job")
            .arg(payload)
            .arg("error")
            .arg(reason)
            .arg("original_id")
            .arg(message_id)
            .arg("failed_at")
            .arg(Utc::now().to_rfc3339())
            .query_async::<()>(conn)
            .await?;
        self.remove(conn, message_id).await
    }

    /// Turn a raw stream entry into a delivery, dead-lettering payloads that
    /// do not parse or validate.
    async fn into_delivery(
        &self,
        conn: &mut MultiplexedConnection,
        entry: StreamId,
    ) -> QueueResult<Option<Delivery>> {
        let message_id = entry.id.clone();
        let payload: String = entry.get("job").unwrap_or_default();

        let job = match QueueJob::from_payload(&payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(message_id = %message_id, "Rejecting malformed job payload: {}", e);
                self.push_dead_letter(conn, &message_id, &payload, &e.to_string())
                    .await?;
                return Ok(None);
            }
        };

        let key = attempts_key(job.job_id());
        let attempt: u32 = conn.incr(&key, 1).await?;
        conn.expire::<_, ()>(&key, ATTEMPTS_TTL_SECS).await?;

        debug!(job_id = %job.job_id(), attempt, "Consumed job from stream");

        Ok(Some(Delivery {
            receipt: message_id,
            job,
            attempt,
        }))
    }
}

#[async_trait]
impl JobBroker for JobQueue {
    async fn enqueue(&self, job: QueueJob) -> QueueResult<JobId> {
        job.validate()?;
        let mut conn = self.conn().await?;

        let payload = serde_json::to_string(&job)?;
        let idempotency_key = job.idempotency_key();

        let fresh: bool = redis::cmd("SET")
            .arg(dedup_key(&idempotency_key))
            .arg("1")
            .arg("NX")
            .arg("EX")
            .arg(self.config.dedup_ttl.as_secs())
            .query_async::<Option<String>>(&mut conn)
            .await?
            .is_some();
        if !fresh {
            warn!("Duplicate job rejected: {}", idempotency_key);
            return Err(QueueError::Duplicate(idempotency_key));
        }

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg("job")
            .arg(&payload)
            .query_async(&mut conn)
            .await?;

        info!(
            job_id = %job.job_id(),
            content_id = %job.content_id(),
            "Enqueued {} job with message ID {}",
            job.media_kind().as_str(),
            message_id
        );

        Ok(job.job_id().clone())
    }

    async fn dequeue(&self, consumer: &str, block: Duration) -> QueueResult<Option<Delivery>> {
        let mut conn = self.conn().await?;

        self.promote_due(&mut conn).await?;

        let entry = match self.claim_expired(&mut conn, consumer).await? {
            Some(entry) => Some(entry),
            None => self.read_new(&mut conn, consumer, block).await?,
        };

        match entry {
            Some(entry) => self.into_delivery(&mut conn, entry).await,
            None => Ok(None),
        }
    }

    async fn ack(&self, delivery: &Delivery) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        self.remove(&mut conn, &delivery.receipt).await?;
        conn.del::<_, ()>(attempts_key(delivery.job_id())).await?;
        debug!("Acknowledged job: {}", delivery.receipt);
        Ok(())
    }

    async fn retry(&self, delivery: &Delivery, delay: Duration) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(&delivery.job)?;
        let due_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        conn.zadd::<_, _, _, ()>(self.config.delayed_key(), &payload, due_at)
            .await?;
        self.remove(&mut conn, &delivery.receipt).await?;

        info!(
            job_id = %delivery.job_id(),
            attempt = delivery.attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduled job retry"
        );
        Ok(())
    }

    async fn dead_letter(&self, delivery: &Delivery, reason: &str) -> QueueResult<()> {
        let mut conn = self.conn().await?;
        let payload = serde_json::to_string(&delivery.job)?;
        self.push_dead_letter(&mut conn, &delivery.receipt, &payload, reason)
            .await?;
        conn.del::<_, ()>(attempts_key(delivery.job_id())).await?;

        warn!("Moved job {} to DLQ: {}", delivery.job_id(), reason);
        Ok(())
    }

    async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let ready: u64 = conn.xlen(&self.config.stream_name).await?;
        let delayed: u64 = conn.zcard(self.config.delayed_key()).await?;
        Ok(ready + delayed)
    }

    async fn dead_letter_len(&self) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }
}
