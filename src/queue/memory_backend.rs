//! In-memory dispatch queue.
//!
//! Payloads are kept in a FIFO `VecDeque`; deliveries handed to consumers are
//! tracked in a `DashMap` keyed by receipt until acked. Everything is lost on
//! restart, so this backend suits development, tests and single-process
//! deployments.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use uuid::Uuid;

use super::backend::{DispatchQueue, QueueError};
use super::models::{DeadLetter, Delivery, DispatchPayload, QueueStats, QueuedDispatch};

/// Process-local `DispatchQueue`.
#[derive(Default)]
pub struct MemoryDispatchQueue {
    ready: Mutex<VecDeque<QueuedDispatch>>,
    /// receipt -> payload currently held by a consumer
    in_flight: DashMap<String, QueuedDispatch>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    notify: Notify,
    closed: AtomicBool,
}

impl MemoryDispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of dead-lettered payloads.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    /// Snapshot of payloads waiting to be delivered, oldest first.
    pub async fn pending(&self) -> Vec<DispatchPayload> {
        self.ready
            .lock()
            .await
            .iter()
            .map(|queued| queued.payload.clone())
            .collect()
    }

    async fn try_take(&self) -> Option<Delivery> {
        let mut ready = self.ready.lock().await;
        let mut queued = ready.pop_front()?;

        queued.attempts += 1;
        let receipt = Uuid::new_v4().to_string();
        let delivery = Delivery {
            payload: queued.payload.clone(),
            attempt: queued.attempts,
            enqueued_at: queued.enqueued_at,
            receipt: receipt.clone(),
        };
        self.in_flight.insert(receipt, queued);

        Some(delivery)
    }

    fn take_in_flight(&self, delivery: &Delivery) -> Result<QueuedDispatch, QueueError> {
        self.in_flight
            .remove(delivery.receipt())
            .map(|(_, queued)| queued)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery.receipt().to_string()))
    }
}

#[async_trait]
impl DispatchQueue for MemoryDispatchQueue {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(&self, payload: DispatchPayload) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let queue_size = {
            let mut ready = self.ready.lock().await;
            ready.push_back(QueuedDispatch::new(payload));
            ready.len()
        };
        self.notify.notify_one();

        tracing::debug!(queue_size = queue_size, "Payload enqueued");
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            if self.is_closed() {
                return Ok(None);
            }

            if let Some(delivery) = self.try_take().await {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            // Woken by enqueue/nack/close; the loop re-checks either way
            let _ = tokio::time::timeout(deadline - now, self.notify.notified()).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.take_in_flight(delivery)?;
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> Result<(), QueueError> {
        let queued = self.take_in_flight(&delivery)?;
        self.ready.lock().await.push_back(queued);
        self.notify.notify_one();

        tracing::debug!(attempt = delivery.attempt, "Payload returned for redelivery");
        Ok(())
    }

    async fn dead_letter(&self, delivery: Delivery, reason: &str) -> Result<(), QueueError> {
        let queued = self.take_in_flight(&delivery)?;
        self.dead_letters.lock().await.push(DeadLetter {
            dispatch: queued,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        });
        Ok(())
    }

    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        let receipts: Vec<String> = self.in_flight.iter().map(|r| r.key().clone()).collect();
        let mut recovered = 0;

        let mut ready = self.ready.lock().await;
        for receipt in receipts {
            if let Some((_, queued)) = self.in_flight.remove(&receipt) {
                ready.push_front(queued);
                recovered += 1;
            }
        }
        drop(ready);

        if recovered > 0 {
            self.notify.notify_waiters();
            tracing::info!(recovered = recovered, "Recovered in-flight payloads");
        }

        Ok(recovered)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        Ok(QueueStats {
            backend: "memory".to_string(),
            ready: self.ready.lock().await.len(),
            in_flight: self.in_flight.len(),
            dead_lettered: self.dead_letters.lock().await.len(),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
        tracing::info!("Memory dispatch queue closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
