//! Typed topic producers and subscriptions over the durable queue.
//!
//! Delivery is at-least-once. A handler reports whether it consumed the
//! message; anything else makes the message visible again after the
//! redelivery delay, until the delivery limit parks it as dead-lettered.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sigwarden_core::config::WorkerConfig;
use sigwarden_metadata::{MetadataError, MetadataStore};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("queue error: {0}")]
    Queue(#[from] MetadataError),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handles one decoded message.
///
/// `Ok(true)` completes the message. `Ok(false)` and errors abandon it for
/// redelivery.
#[async_trait]
pub trait MessageHandler<M>: Send + Sync {
    async fn handle(&self, message: &M) -> anyhow::Result<bool>;
}

/// Publishes messages of one type to one topic.
pub struct TopicProducer<M> {
    store: Arc<dyn MetadataStore>,
    topic: String,
    _message: PhantomData<fn(&M)>,
}

impl<M: Serialize> TopicProducer<M> {
    pub fn new(store: Arc<dyn MetadataStore>, topic: impl Into<String>) -> Self {
        Self {
            store,
            topic: topic.into(),
            _message: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Encode and enqueue `message`. Returns the queue message id.
    pub async fn send(&self, message: &M) -> Result<Uuid, MessagingError> {
        let body = serde_json::to_string(message)?;
        let message_id = self.store.enqueue_message(&self.topic, &body).await?;
        tracing::debug!(topic = %self.topic, message_id = %message_id, "Message enqueued");
        Ok(message_id)
    }
}

/// A decoded message under lease.
#[derive(Debug)]
pub struct Delivery<M> {
    pub message_id: Uuid,
    /// Deliveries including this one.
    pub delivery_count: u32,
    pub message: M,
}

/// Leases and decodes messages of one type from one topic.
pub struct Subscription<M> {
    store: Arc<dyn MetadataStore>,
    topic: String,
    lease: Duration,
    max_delivery_count: u32,
    redelivery_delay: Duration,
    _message: PhantomData<fn() -> M>,
}

impl<M: DeserializeOwned> Subscription<M> {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        topic: impl Into<String>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            store,
            topic: topic.into(),
            lease: config.lease(),
            max_delivery_count: config.max_delivery_count,
            redelivery_delay: config.redelivery_delay(),
            _message: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Lease the next deliverable message, if any.
    ///
    /// Messages past the delivery limit and bodies that do not decode are
    /// dead-lettered on the way and never returned.
    pub async fn receive(&self) -> Result<Option<Delivery<M>>, MessagingError> {
        loop {
            let now = OffsetDateTime::now_utc();
            let Some(leased) = self
                .store
                .lease_next_message(&self.topic, now, now + self.lease)
                .await?
            else {
                return Ok(None);
            };

            if leased.delivery_count > self.max_delivery_count {
                self.dead_letter(leased.message_id, "delivery limit exceeded")
                    .await?;
                continue;
            }

            match serde_json::from_str::<M>(&leased.body) {
                Ok(message) => {
                    return Ok(Some(Delivery {
                        message_id: leased.message_id,
                        delivery_count: leased.delivery_count,
                        message,
                    }));
                }
                Err(e) => {
                    self.dead_letter(leased.message_id, &format!("undecodable body: {e}"))
                        .await?;
                }
            }
        }
    }

    /// Remove a consumed message.
    pub async fn complete(&self, message_id: Uuid) -> Result<(), MessagingError> {
        self.store.complete_message(message_id).await?;
        Ok(())
    }

    /// Make a message visible again after the redelivery delay.
    pub async fn abandon(&self, message_id: Uuid) -> Result<(), MessagingError> {
        let visible_at = OffsetDateTime::now_utc() + self.redelivery_delay;
        self.store.abandon_message(message_id, visible_at).await?;
        Ok(())
    }

    async fn dead_letter(&self, message_id: Uuid, reason: &str) -> Result<(), MessagingError> {
        self.store.dead_letter_message(message_id, reason).await?;
        crate::metrics::MESSAGES_DEAD_LETTERED
            .with_label_values(&[self.topic.as_str()])
            .inc();
        tracing::warn!(
            topic = %self.topic,
            message_id = %message_id,
            reason = %reason,
            "Message dead-lettered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigwarden_core::SignatureValidationMessage;
    use sigwarden_metadata::{MessageState, SqliteStore};

    const TOPIC: &str = "signature-validation";

    async fn store() -> (tempfile::TempDir, Arc<dyn MetadataStore>) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("trust.db"), None)
            .await
            .unwrap();
        (temp, Arc::new(store))
    }

    fn message() -> SignatureValidationMessage {
        SignatureValidationMessage {
            package_id: "Contoso.Core".to_string(),
            package_version: "1.0.0".to_string(),
            package_content_uri: "https://packages.example.com/contoso.core.1.0.0.pkg"
                .parse()
                .unwrap(),
            validation_id: Uuid::new_v4(),
        }
    }

    fn config(max_delivery_count: u32) -> WorkerConfig {
        WorkerConfig {
            max_delivery_count,
            redelivery_delay_secs: 0,
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_send_and_receive_round_trip() {
        let (_temp, store) = store().await;
        let producer = TopicProducer::new(store.clone(), TOPIC);
        let subscription = Subscription::<SignatureValidationMessage>::new(store, TOPIC, &config(3));

        let sent = message();
        let message_id = producer.send(&sent).await.unwrap();

        let delivery = subscription.receive().await.unwrap().unwrap();
        assert_eq!(delivery.message_id, message_id);
        assert_eq!(delivery.delivery_count, 1);
        assert_eq!(delivery.message, sent);
        assert!(subscription.receive().await.unwrap().is_none());

        subscription.complete(message_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_undecodable_body_is_dead_lettered() {
        let (_temp, store) = store().await;
        store.enqueue_message(TOPIC, "{\"bogus\": true}").await.unwrap();
        let subscription =
            Subscription::<SignatureValidationMessage>::new(store.clone(), TOPIC, &config(3));

        assert!(subscription.receive().await.unwrap().is_none());
        assert_eq!(
            store
                .count_messages(TOPIC, MessageState::DeadLettered)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_delivery_limit_dead_letters() {
        let (_temp, store) = store().await;
        let producer = TopicProducer::new(store.clone(), TOPIC);
        let subscription =
            Subscription::<SignatureValidationMessage>::new(store.clone(), TOPIC, &config(2));
        producer.send(&message()).await.unwrap();

        for expected in 1..=2 {
            let delivery = subscription.receive().await.unwrap().unwrap();
            assert_eq!(delivery.delivery_count, expected);
            subscription.abandon(delivery.message_id).await.unwrap();
        }

        assert!(subscription.receive().await.unwrap().is_none());
        assert_eq!(
            store
                .count_messages(TOPIC, MessageState::DeadLettered)
                .await
                .unwrap(),
            1
        );
    }
}
