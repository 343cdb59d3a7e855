//! Queue consumer: persists dispatched payloads as `SENT` messages.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{ConsumerConfig, QueueConfig};
use crate::message::{Message, MessageStatus, ValidationError};
use crate::metrics::ConsumerMetrics;
use crate::queue::{Delivery, DispatchPayload, DispatchQueue, QueueError};
use crate::redis::{BackoffConfig, ExponentialBackoff};
use crate::store::{InsertOutcome, MessageStore, StoreError};

/// Why a payload could not be persisted.
#[derive(Debug, Error)]
pub enum ConsumeError {
    /// The payload can never succeed; it is dead-lettered, not retried
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Infrastructure failure; eligible for redelivery
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Persisted,
    Duplicate,
    Redelivered,
    DeadLettered,
}

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Deliveries attempted before a store failure is dead-lettered
    pub max_deliveries: u32,
    /// Upper bound on one blocking dequeue
    pub dequeue_wait: Duration,
    /// Pause after failures
    pub backoff: BackoffConfig,
}

impl ConsumerSettings {
    pub fn from_config(queue: &QueueConfig, consumer: &ConsumerConfig) -> Self {
        Self {
            max_deliveries: queue.max_deliveries.max(1),
            dequeue_wait: Duration::from_millis(consumer.dequeue_wait_ms),
            backoff: BackoffConfig {
                initial_delay_ms: consumer.backoff_initial_ms,
                max_delay_ms: consumer.backoff_max_ms,
                ..Default::default()
            },
        }
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default(), &ConsumerConfig::default())
    }
}

/// Handles deliveries from the dispatch queue.
///
/// Holds no per-delivery state, so one instance is shared by every worker.
pub struct MessageConsumer {
    queue: Arc<dyn DispatchQueue>,
    store: Arc<dyn MessageStore>,
    settings: ConsumerSettings,
}

impl MessageConsumer {
    pub fn new(
        queue: Arc<dyn DispatchQueue>,
        store: Arc<dyn MessageStore>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            queue,
            store,
            settings,
        }
    }

    /// Build the persisted message for `payload` and insert it.
    ///
    /// The payload uuid becomes the message uuid so that redelivery of the
    /// same payload is absorbed by the store.
    pub async fn handle(&self, payload: &DispatchPayload) -> Result<InsertOutcome, ConsumeError> {
        let mut message = match payload.uuid {
            Some(uuid) => Message::with_uuid(uuid, payload.text.as_str())?,
            None => Message::new(payload.text.as_str())?,
        };
        message.set_status(Some(MessageStatus::Sent));

        Ok(self.store.insert(&message).await?)
    }

    /// Handle one delivery and settle it with the queue.
    #[tracing::instrument(
        name = "consumer.process",
        skip(self, delivery),
        fields(attempt = delivery.attempt, uuid = ?delivery.payload.uuid)
    )]
    pub async fn process(&self, delivery: Delivery) -> Result<DeliveryOutcome, QueueError> {
        let started = Instant::now();

        // Earlier deliveries were abandoned without settling, e.g. the worker died
        if delivery.attempt > self.settings.max_deliveries {
            tracing::error!(
                max_deliveries = self.settings.max_deliveries,
                "Delivery attempts exhausted, dead-lettering"
            );
            self.queue
                .dead_letter(delivery, "delivery attempts exhausted")
                .await?;
            ConsumerMetrics::record_dead_lettered();
            return Ok(DeliveryOutcome::DeadLettered);
        }

        let outcome = match self.handle(&delivery.payload).await {
            Ok(InsertOutcome::Inserted { id }) => {
                self.queue.ack(&delivery).await?;
                ConsumerMetrics::record_persisted();
                tracing::debug!(id = id, "Message persisted");
                DeliveryOutcome::Persisted
            }
            Ok(InsertOutcome::Duplicate) => {
                self.queue.ack(&delivery).await?;
                ConsumerMetrics::record_duplicate();
                tracing::info!("Duplicate delivery acknowledged");
                DeliveryOutcome::Duplicate
            }
            Err(ConsumeError::Validation(e)) => {
                tracing::error!(error = %e, "Payload failed validation, dead-lettering");
                self.queue.dead_letter(delivery, &e.to_string()).await?;
                ConsumerMetrics::record_dead_lettered();
                DeliveryOutcome::DeadLettered
            }
            Err(ConsumeError::Store(e)) if delivery.attempt >= self.settings.max_deliveries => {
                tracing::error!(
                    error = %e,
                    max_deliveries = self.settings.max_deliveries,
                    "Store failed on final attempt, dead-lettering"
                );
                self.queue.dead_letter(delivery, &e.to_string()).await?;
                ConsumerMetrics::record_dead_lettered();
                DeliveryOutcome::DeadLettered
            }
            Err(ConsumeError::Store(e)) => {
                tracing::warn!(error = %e, "Store failed, returning payload for redelivery");
                self.queue.nack(delivery).await?;
                ConsumerMetrics::record_redelivered();
                DeliveryOutcome::Redelivered
            }
        };

        ConsumerMetrics::observe_processing(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Worker loop: dequeue and process until shutdown or queue close.
    ///
    /// Shutdown is only observed between deliveries; a delivery in progress
    /// is always settled first.
    pub async fn run(&self, worker_id: usize, mut shutdown: broadcast::Receiver<()>) {
        let mut backoff = ExponentialBackoff::with_config(self.settings.backoff.clone());
        tracing::info!(worker_id = worker_id, "Consumer worker started");

        loop {
            if self.queue.is_closed() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown.recv() => break,
                next = self.queue.dequeue(self.settings.dequeue_wait) => next,
            };

            let failed = match next {
                Ok(Some(delivery)) => match self.process(delivery).await {
                    Ok(DeliveryOutcome::Redelivered) => true,
                    Ok(_) => false,
                    Err(QueueError::UnknownDelivery(receipt)) => {
                        tracing::warn!(
                            worker_id = worker_id,
                            receipt = %receipt,
                            "Delivery was no longer tracked by the queue"
                        );
                        false
                    }
                    Err(e) => {
                        tracing::error!(worker_id = worker_id, error = %e, "Failed to settle delivery");
                        true
                    }
                },
                Ok(None) => false,
                Err(e) => {
                    tracing::error!(worker_id = worker_id, error = %e, "Dequeue failed");
                    true
                }
            };

            if failed {
                let delay = backoff.next_delay();
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            } else {
                backoff.reset();
            }
        }

        tracing::info!(worker_id = worker_id, "Consumer worker stopped");
    }
}

/// A set of consumer worker tasks.
pub struct ConsumerPool {
    handles: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    /// Recover abandoned deliveries, then spawn `workers` loops.
    pub async fn start(
        consumer: Arc<MessageConsumer>,
        workers: usize,
        shutdown: &broadcast::Sender<()>,
    ) -> Self {
        match consumer.queue.recover_in_flight().await {
            Ok(0) => {}
            Ok(recovered) => {
                tracing::info!(recovered = recovered, "Requeued deliveries from a previous run")
            }
            Err(e) => tracing::warn!(error = %e, "Failed to recover in-flight deliveries"),
        }

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let consumer = consumer.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { consumer.run(worker_id, shutdown).await })
            })
            .collect();

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit, giving up after `timeout`.
    ///
    /// Returns the number of workers that stopped in time; the rest are aborted.
    pub async fn join(self, timeout: Duration) -> usize {
        let total = self.handles.len();
        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(timeout, futures::future::join_all(self.handles)).await {
            Ok(_) => total,
            Err(_) => {
                let stopped = aborts.iter().filter(|h| h.is_finished()).count();
                tracing::warn!(
                    stopped = stopped,
                    total = total,
                    "Consumer workers did not stop in time, aborting"
                );
                for handle in aborts {
                    handle.abort();
                }
                stopped
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use uuid::Uuid;

    use super::*;
    use crate::queue::MemoryDispatchQueue;
    use crate::store::{MemoryMessageStore, MessageFilter};

    const NO_WAIT: Duration = Duration::from_millis(0);

    /// Store that fails the first `failures` inserts.
    struct FlakyStore {
        inner: MemoryMessageStore,
        failures: AtomicUsize,
    }

    impl FlakyStore {
        fn new(failures: usize) -> Self {
            Self {
                inner: MemoryMessageStore::new(),
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl MessageStore for FlakyStore {
        fn backend_name(&self) -> &'static str {
            "flaky"
        }

        async fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.insert(message).await
        }

        async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError> {
            self.inner.query(filter).await
        }

        async fn count(&self) -> Result<usize, StoreError> {
            self.inner.count().await
        }
    }

    fn settings(max_deliveries: u32) -> ConsumerSettings {
        ConsumerSettings {
            max_deliveries,
            dequeue_wait: Duration::from_millis(20),
            backoff: BackoffConfig {
                initial_delay_ms: 1,
                max_delay_ms: 5,
                multiplier: 2.0,
                jitter_factor: 0.0,
            },
        }
    }

    fn setup(
        store: Arc<dyn MessageStore>,
        max_deliveries: u32,
    ) -> (MessageConsumer, Arc<MemoryDispatchQueue>) {
        let queue = Arc::new(MemoryDispatchQueue::new());
        let consumer = MessageConsumer::new(queue.clone(), store, settings(max_deliveries));
        (consumer, queue)
    }

    #[tokio::test]
    async fn test_handle_persists_sent_message() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, _queue) = setup(store.clone(), 3);
        let uuid = Uuid::new_v4();

        let outcome = consumer
            .handle(&DispatchPayload::new(uuid, "Hello World"))
            .await
            .unwrap();
        assert!(!outcome.is_duplicate());

        let stored = store.query(&MessageFilter::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].text(), "Hello World");
        assert_eq!(stored[0].status(), Some(MessageStatus::Sent));
        assert_eq!(stored[0].uuid(), uuid);
    }

    #[tokio::test]
    async fn test_handle_payload_without_uuid_gets_fresh_one() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, _queue) = setup(store.clone(), 3);
        let payload = DispatchPayload {
            uuid: None,
            text: "legacy".to_string(),
        };

        consumer.handle(&payload).await.unwrap();
        consumer.handle(&payload).await.unwrap();

        // Without an idempotency key every delivery is a new record
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_redelivery_is_idempotent() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, queue) = setup(store.clone(), 3);
        let payload = DispatchPayload::new(Uuid::new_v4(), "Hello World");

        queue.enqueue(payload.clone()).await.unwrap();
        queue.enqueue(payload).await.unwrap();

        let first = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(consumer.process(first).await.unwrap(), DeliveryOutcome::Persisted);

        let second = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(consumer.process(second).await.unwrap(), DeliveryOutcome::Duplicate);

        let stored = store.query(&MessageFilter::all()).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(queue.stats().await.unwrap().in_flight, 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_dead_lettered_not_retried() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, queue) = setup(store.clone(), 3);

        queue
            .enqueue(DispatchPayload::new(Uuid::new_v4(), "   "))
            .await
            .unwrap();

        let delivery = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(
            consumer.process(delivery).await.unwrap(),
            DeliveryOutcome::DeadLettered
        );

        assert!(queue.dequeue(NO_WAIT).await.unwrap().is_none());
        assert_eq!(queue.dead_letters().await.len(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_is_redelivered_then_persisted() {
        let store = Arc::new(FlakyStore::new(1));
        let (consumer, queue) = setup(store.clone(), 3);

        queue
            .enqueue(DispatchPayload::new(Uuid::new_v4(), "eventually"))
            .await
            .unwrap();

        let first = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(consumer.process(first).await.unwrap(), DeliveryOutcome::Redelivered);

        let second = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(consumer.process(second).await.unwrap(), DeliveryOutcome::Persisted);

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_store_failure_dead_letters_after_max_deliveries() {
        let store = Arc::new(FlakyStore::new(10));
        let (consumer, queue) = setup(store.clone(), 2);

        queue
            .enqueue(DispatchPayload::new(Uuid::new_v4(), "doomed"))
            .await
            .unwrap();

        let first = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(consumer.process(first).await.unwrap(), DeliveryOutcome::Redelivered);

        let second = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(consumer.process(second).await.unwrap(), DeliveryOutcome::DeadLettered);

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert!(dead[0].reason.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_abandoned_deliveries_exhaust_attempts() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, queue) = setup(store.clone(), 2);

        queue
            .enqueue(DispatchPayload::new(Uuid::new_v4(), "crashes its worker"))
            .await
            .unwrap();

        // Two deliveries taken and never settled, as if the worker died each time
        for _ in 0..2 {
            queue.dequeue(NO_WAIT).await.unwrap().unwrap();
            queue.recover_in_flight().await.unwrap();
        }

        let third = queue.dequeue(NO_WAIT).await.unwrap().unwrap();
        assert_eq!(third.attempt, 3);
        assert_eq!(consumer.process(third).await.unwrap(), DeliveryOutcome::DeadLettered);

        let dead = queue.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "delivery attempts exhausted");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pool_drains_queue_and_stops_on_shutdown() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, queue) = setup(store.clone(), 3);
        let (shutdown_tx, _) = broadcast::channel(1);

        for i in 0..10 {
            queue
                .enqueue(DispatchPayload::new(Uuid::new_v4(), format!("message {}", i)))
                .await
                .unwrap();
        }

        let pool = ConsumerPool::start(Arc::new(consumer), 3, &shutdown_tx).await;
        assert_eq!(pool.len(), 3);

        for _ in 0..100 {
            if store.count().await.unwrap() == 10 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.count().await.unwrap(), 10);

        shutdown_tx.send(()).unwrap();
        assert_eq!(pool.join(Duration::from_secs(2)).await, 3);
    }

    #[tokio::test]
    async fn test_worker_exits_when_queue_closed() {
        let store = Arc::new(MemoryMessageStore::new());
        let (consumer, queue) = setup(store, 3);
        let (shutdown_tx, _) = broadcast::channel(1);

        let pool = ConsumerPool::start(Arc::new(consumer), 1, &shutdown_tx).await;
        queue.close().await;

        assert_eq!(pool.join(Duration::from_secs(2)).await, 1);
    }
}
