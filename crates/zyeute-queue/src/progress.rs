//! Owner notifications via Redis Pub/Sub.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tracing::debug;

use zyeute_models::{Notification, OwnerId, PipelineStage};

use crate::error::QueueResult;

/// Event published on an owner's channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub owner_id: OwnerId,
    pub message: Notification,
}

/// Publisher for owner notifications.
pub struct ProgressChannel {
    client: redis::Client,
}

impl ProgressChannel {
    /// Create a new progress channel.
    pub fn new(redis_url: &str) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Get the channel name for an owner.
    pub fn channel_name(owner_id: &OwnerId) -> String {
        format!("zyeute:notifications:{}", owner_id)
    }

    /// Publish a notification.
    pub async fn publish(&self, event: &NotificationEvent) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let channel = Self::channel_name(&event.owner_id);
        let payload = serde_json::to_string(event)?;

        debug!("Publishing notification to {}", channel);
        conn.publish::<_, _, ()>(channel, payload).await?;

        Ok(())
    }

    /// Publish a progress update.
    pub async fn progress(
        &self,
        owner_id: &OwnerId,
        content_id: &str,
        percent: u8,
        phase: &str,
    ) -> QueueResult<()> {
        self.publish(&NotificationEvent {
            owner_id: owner_id.clone(),
            message: Notification::progress(content_id, percent, phase),
        })
        .await
    }

    /// Publish the progress update for entering a stage.
    pub async fn stage(
        &self,
        owner_id: &OwnerId,
        content_id: &str,
        stage: PipelineStage,
    ) -> QueueResult<()> {
        self.publish(&NotificationEvent {
            owner_id: owner_id.clone(),
            message: Notification::stage(content_id, stage),
        })
        .await
    }

    /// Publish the terminal success message.
    pub async fn done(&self, owner_id: &OwnerId, content_id: &str, url: &str) -> QueueResult<()> {
        self.publish(&NotificationEvent {
            owner_id: owner_id.clone(),
            message: Notification::success(content_id, url),
        })
        .await
    }

    /// Publish the terminal failure message.
    pub async fn failed(
        &self,
        owner_id: &OwnerId,
        content_id: &str,
        message: impl Into<String>,
    ) -> QueueResult<()> {
        self.publish(&NotificationEvent {
            owner_id: owner_id.clone(),
            message: Notification::failure(content_id, message),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name() {
        let owner = OwnerId::from("u1");
        assert_eq!(ProgressChannel::channel_name(&owner), "zyeute:notifications:u1");
    }

    #[test]
    fn test_event_serialization() {
        let event = NotificationEvent {
            owner_id: OwnerId::from("u1"),
            message: Notification::stage("c1", PipelineStage::Downloading),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["owner_id"], "u1");
        assert_eq!(json["message"]["percent"], 10);
    }
}
