//! Durable message subscription repository.

use crate::error::MetadataResult;
use crate::models::LeasedMessage;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository backing topic subscriptions with at-least-once delivery.
///
/// A leased message is invisible until its lease expires; if the consumer
/// neither completes nor abandons it in time it is delivered again.
#[async_trait]
pub trait QueueRepo: Send + Sync {
    /// Append a message to a topic. Returns its id.
    async fn enqueue_message(&self, topic: &str, body: &str) -> MetadataResult<Uuid>;

    /// Lease the oldest visible message of a topic until `lease_until`.
    ///
    /// The returned message's delivery count includes this delivery.
    async fn lease_next_message(
        &self,
        topic: &str,
        now: OffsetDateTime,
        lease_until: OffsetDateTime,
    ) -> MetadataResult<Option<LeasedMessage>>;

    /// Remove a handled message.
    async fn complete_message(&self, message_id: Uuid) -> MetadataResult<()>;

    /// Release a message for redelivery at `visible_at`.
    async fn abandon_message(&self, message_id: Uuid, visible_at: OffsetDateTime)
    -> MetadataResult<()>;

    /// Park a message that must not be delivered again.
    async fn dead_letter_message(&self, message_id: Uuid, reason: &str) -> MetadataResult<()>;

    /// Count a topic's messages in a state.
    async fn count_messages(&self, topic: &str, state: MessageState) -> MetadataResult<u64>;
}

/// Queue message state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    /// Waiting for, or currently in, delivery.
    Active,
    /// Parked after exceeding the delivery limit or failing to decode.
    DeadLettered,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::DeadLettered => "dead_lettered",
        }
    }
}
