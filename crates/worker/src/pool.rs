//! Concurrent message workers.

use crate::messaging::{Delivery, MessageHandler, Subscription};
use serde::de::DeserializeOwned;
use sigwarden_core::config::WorkerConfig;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Work source the runner can stop and wait on.
pub trait Drainable: Send + Sync {
    /// Stop picking up new work. In-flight work keeps running.
    fn stop_accepting(&self);

    /// Number of units of work currently running.
    fn in_flight(&self) -> usize;
}

impl<D: Drainable> Drainable for Vec<D> {
    fn stop_accepting(&self) {
        for pool in self {
            pool.stop_accepting();
        }
    }

    fn in_flight(&self) -> usize {
        self.iter().map(Drainable::in_flight).sum()
    }
}

/// A fixed set of tokio tasks consuming one subscription.
pub struct WorkerPool {
    topic: String,
    intake: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.concurrency` workers feeding `handler` from `subscription`.
    pub fn start<M, H>(subscription: Subscription<M>, handler: Arc<H>, config: &WorkerConfig) -> Self
    where
        M: DeserializeOwned + Send + Sync + 'static,
        H: MessageHandler<M> + ?Sized + 'static,
    {
        let topic = subscription.topic().to_string();
        let subscription = Arc::new(subscription);
        let intake = CancellationToken::new();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let workers = (0..config.concurrency)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    worker_id,
                    subscription.clone(),
                    handler.clone(),
                    intake.clone(),
                    in_flight.clone(),
                    config.poll_interval(),
                ))
            })
            .collect();

        tracing::info!(
            topic = %topic,
            concurrency = config.concurrency,
            "Worker pool started"
        );

        Self {
            topic,
            intake,
            in_flight,
            workers,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for every worker loop to exit. Call after [`Drainable::stop_accepting`].
    pub async fn join(self) {
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::error!(topic = %self.topic, error = %e, "Worker task failed");
            }
        }
    }
}

impl Drainable for WorkerPool {
    fn stop_accepting(&self) {
        if !self.intake.is_cancelled() {
            tracing::info!(topic = %self.topic, "Worker pool stopped accepting messages");
        }
        self.intake.cancel();
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Counts a worker as busy, from lease through settlement, until dropped.
struct InFlightGuard {
    counter: Arc<AtomicUsize>,
    topic: String,
}

impl InFlightGuard {
    fn new(counter: Arc<AtomicUsize>, topic: &str) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        crate::metrics::MESSAGES_IN_FLIGHT
            .with_label_values(&[topic])
            .inc();
        Self {
            counter,
            topic: topic.to_string(),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        crate::metrics::MESSAGES_IN_FLIGHT
            .with_label_values(&[self.topic.as_str()])
            .dec();
    }
}

async fn run_worker<M, H>(
    worker_id: usize,
    subscription: Arc<Subscription<M>>,
    handler: Arc<H>,
    intake: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    poll_interval: Duration,
) where
    M: DeserializeOwned + Send + Sync + 'static,
    H: MessageHandler<M> + ?Sized + 'static,
{
    let topic = subscription.topic().to_string();
    tracing::debug!(topic = %topic, worker_id, "Worker started");

    loop {
        // Counted before the intake check so a drain never reads zero while a
        // lease is outstanding.
        let guard = InFlightGuard::new(in_flight.clone(), &topic);
        if intake.is_cancelled() {
            break;
        }

        let delivery = match subscription.receive().await {
            Ok(Some(delivery)) => delivery,
            Ok(None) => {
                drop(guard);
                idle(&intake, poll_interval).await;
                continue;
            }
            Err(e) => {
                drop(guard);
                tracing::error!(topic = %topic, worker_id, error = %e, "Failed to receive message");
                idle(&intake, poll_interval).await;
                continue;
            }
        };

        if intake.is_cancelled() {
            // Leased after intake closed: hand it back untouched.
            if let Err(e) = subscription.abandon(delivery.message_id).await {
                tracing::error!(
                    topic = %topic,
                    message_id = %delivery.message_id,
                    error = %e,
                    "Failed to release message leased during shutdown"
                );
            }
            break;
        }

        process(&topic, &subscription, handler.clone(), delivery).await;
        drop(guard);
    }

    tracing::debug!(topic = %topic, worker_id, "Worker stopped");
}

/// Sleep for the poll interval unless intake closes first.
async fn idle(intake: &CancellationToken, poll_interval: Duration) {
    tokio::select! {
        _ = intake.cancelled() => {}
        _ = tokio::time::sleep(poll_interval) => {}
    }
}

async fn process<M, H>(
    topic: &str,
    subscription: &Subscription<M>,
    handler: Arc<H>,
    delivery: Delivery<M>,
) where
    M: DeserializeOwned + Send + Sync + 'static,
    H: MessageHandler<M> + ?Sized + 'static,
{
    let Delivery {
        message_id,
        delivery_count,
        message,
    } = delivery;

    // Handlers run in their own task so a panic is contained to this message.
    let outcome = tokio::spawn(async move { handler.handle(&message).await }).await;

    let consumed = match outcome {
        Ok(Ok(true)) => {
            crate::metrics::record_message_outcome(topic, "consumed");
            true
        }
        Ok(Ok(false)) => {
            crate::metrics::record_message_outcome(topic, "not_consumed");
            tracing::debug!(
                topic = %topic,
                message_id = %message_id,
                delivery_count,
                "Message not consumed, scheduling redelivery"
            );
            false
        }
        Ok(Err(e)) => {
            crate::metrics::record_message_outcome(topic, "error");
            tracing::error!(
                topic = %topic,
                message_id = %message_id,
                delivery_count,
                error = %format!("{e:#}"),
                "Message handler failed"
            );
            false
        }
        Err(join_err) => {
            crate::metrics::record_message_outcome(topic, "panicked");
            tracing::error!(
                topic = %topic,
                message_id = %message_id,
                delivery_count,
                panic = ?join_err,
                "Message handler panicked"
            );
            false
        }
    };

    let settled = if consumed {
        subscription.complete(message_id).await
    } else {
        subscription.abandon(message_id).await
    };
    if let Err(e) = settled {
        // The lease expires on its own and the message is delivered again.
        tracing::error!(
            topic = %topic,
            message_id = %message_id,
            error = %e,
            "Failed to settle message"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::TopicProducer;
    use async_trait::async_trait;
    use sigwarden_metadata::{MessageState, MetadataStore, SqliteStore};
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const TOPIC: &str = "pool-test";

    struct Recording {
        seen: std::sync::Mutex<Vec<u32>>,
        panic_once: AtomicBool,
    }

    #[async_trait]
    impl MessageHandler<u32> for Recording {
        async fn handle(&self, message: &u32) -> anyhow::Result<bool> {
            if *message == 13 && !self.panic_once.swap(true, Ordering::SeqCst) {
                panic!("unlucky message");
            }
            self.seen.lock().unwrap().push(*message);
            Ok(true)
        }
    }

    async fn wait_until(mut done: impl FnMut() -> bool) {
        for _ in 0..500 {
            if done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_pool_consumes_messages_and_survives_panics() {
        let temp = tempfile::tempdir().unwrap();
        let store: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("trust.db"), None)
                .await
                .unwrap(),
        );
        let config = sigwarden_core::config::AppConfig::for_testing().worker;

        let producer = TopicProducer::<u32>::new(store.clone(), TOPIC);
        for n in [1, 13, 42] {
            producer.send(&n).await.unwrap();
        }

        let handler = Arc::new(Recording {
            seen: std::sync::Mutex::new(Vec::new()),
            panic_once: AtomicBool::new(false),
        });
        let pool = WorkerPool::start(
            Subscription::<u32>::new(store.clone(), TOPIC, &config),
            handler.clone(),
            &config,
        );

        wait_until(|| handler.seen.lock().unwrap().len() == 3).await;

        let mut seen = handler.seen.lock().unwrap().clone();
        seen.sort_unstable();
        assert_eq!(seen, vec![1, 13, 42]);

        pool.stop_accepting();
        wait_until(|| pool.in_flight() == 0).await;
        pool.join().await;

        assert_eq!(
            store.count_messages(TOPIC, MessageState::Active).await.unwrap(),
            0
        );
    }

    struct Fixed(usize);

    impl Drainable for Fixed {
        fn stop_accepting(&self) {}

        fn in_flight(&self) -> usize {
            self.0
        }
    }

    #[test]
    fn test_group_sums_in_flight() {
        let group = vec![Fixed(2), Fixed(0), Fixed(3)];
        group.stop_accepting();
        assert_eq!(group.in_flight(), 5);
    }
}
