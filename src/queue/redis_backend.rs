//! Redis dispatch queue using the reliable-queue list pattern.
//!
//! Keys (with `prefix` defaulting to `ara:dispatch`):
//! - `{prefix}:ready`      payloads waiting for a consumer (LPUSH in, pop from the tail)
//! - `{prefix}:processing` payloads handed to a consumer and not yet acked
//! - `{prefix}:dead`       payloads that will not be retried
//!
//! The dequeue step is a single `LMOVE ready processing`, so a payload is
//! never only in the consumer's memory: a crash leaves it in `processing`
//! where `recover_in_flight` finds it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::Instant;

use crate::redis::{PoolError, RedisPool, RedisPoolExt};

use super::backend::{DispatchQueue, QueueError};
use super::models::{DeadLetter, Delivery, DispatchPayload, QueueStats, QueuedDispatch};

/// Redis-backed `DispatchQueue`.
pub struct RedisDispatchQueue {
    pool: Arc<RedisPool>,
    prefix: String,
    /// Sleep between empty polls
    poll_interval: Duration,
    closed: AtomicBool,
}

impl RedisDispatchQueue {
    pub fn new(pool: Arc<RedisPool>, prefix: String, poll_interval: Duration) -> Self {
        Self {
            pool,
            prefix,
            poll_interval,
            closed: AtomicBool::new(false),
        }
    }

    fn ready_key(&self) -> String {
        format!("{}:ready", self.prefix)
    }

    fn processing_key(&self) -> String {
        format!("{}:processing", self.prefix)
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.prefix)
    }

    /// Convert pool error to queue error.
    fn map_error(err: PoolError) -> QueueError {
        match err {
            PoolError::Redis(e) => QueueError::Redis(e),
            PoolError::ConnectionUnavailable(msg) => QueueError::Unavailable(msg),
        }
    }

    fn decode(raw: &str) -> Result<QueuedDispatch, QueueError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The entry is no longer in the processing list, e.g. another instance
    /// recovered it.
    fn unknown(delivery: &Delivery) -> QueueError {
        QueueError::UnknownDelivery(
            delivery.payload.uuid.map(|u| u.to_string()).unwrap_or_default(),
        )
    }

    /// Count the abandoned delivery as an attempt.
    fn recovered_entry(raw: &str) -> Result<String, QueueError> {
        let mut queued = Self::decode(raw)?;
        queued.attempts += 1;
        Ok(serde_json::to_string(&queued)?)
    }

    /// Move one ready entry to processing and turn it into a delivery.
    async fn try_take(&self) -> Result<Option<Delivery>, QueueError> {
        let processing = self.processing_key();

        loop {
            let raw = self
                .pool
                .lmove_tail_to_head(&self.ready_key(), &processing)
                .await
                .map_err(Self::map_error)?;

            let Some(raw) = raw else {
                return Ok(None);
            };

            match Self::decode(&raw) {
                Ok(queued) => {
                    return Ok(Some(Delivery {
                        payload: queued.payload,
                        attempt: queued.attempts + 1,
                        enqueued_at: queued.enqueued_at,
                        receipt: raw,
                    }));
                }
                Err(e) => {
                    // Unparseable entries go straight to the dead list
                    tracing::warn!(error = %e, "Dead-lettering undecodable queue entry");
                    self.pool
                        .replace_between(&processing, &raw, &self.dead_key(), &raw)
                        .await
                        .map_err(Self::map_error)?;
                }
            }
        }
    }
}

#[async_trait]
impl DispatchQueue for RedisDispatchQueue {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(&self, payload: DispatchPayload) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }

        let raw = serde_json::to_string(&QueuedDispatch::new(payload))?;
        let queue_size = self
            .pool
            .lpush(&self.ready_key(), &raw)
            .await
            .map_err(Self::map_error)?;

        tracing::debug!(queue_size = queue_size, key = %self.ready_key(), "Payload enqueued to Redis");
        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            if self.is_closed() {
                return Ok(None);
            }

            if let Some(delivery) = self.try_take().await? {
                return Ok(Some(delivery));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let removed = self
            .pool
            .lrem_one(&self.processing_key(), delivery.receipt())
            .await
            .map_err(Self::map_error)?;

        if removed == 0 {
            return Err(Self::unknown(delivery));
        }
        Ok(())
    }

    async fn nack(&self, delivery: Delivery) -> Result<(), QueueError> {
        let mut queued = Self::decode(delivery.receipt())?;
        queued.attempts = delivery.attempt;
        let replacement = serde_json::to_string(&queued)?;

        let moved = self
            .pool
            .replace_between(
                &self.processing_key(),
                delivery.receipt(),
                &self.ready_key(),
                &replacement,
            )
            .await
            .map_err(Self::map_error)?;
        if !moved {
            return Err(Self::unknown(&delivery));
        }

        tracing::debug!(attempt = delivery.attempt, "Payload returned to Redis ready list");
        Ok(())
    }

    async fn dead_letter(&self, delivery: Delivery, reason: &str) -> Result<(), QueueError> {
        let mut queued = Self::decode(delivery.receipt())?;
        queued.attempts = delivery.attempt;

        let dead = serde_json::to_string(&DeadLetter {
            dispatch: queued,
            reason: reason.to_string(),
            failed_at: Utc::now(),
        })?;

        let moved = self
            .pool
            .replace_between(&self.processing_key(), delivery.receipt(), &self.dead_key(), &dead)
            .await
            .map_err(Self::map_error)?;
        if !moved {
            return Err(Self::unknown(&delivery));
        }
        Ok(())
    }

    /// Requeues everything in the processing list, counting each entry as a
    /// spent attempt so a payload that kills its worker still runs out of
    /// deliveries. With several service instances sharing one prefix this
    /// can also pick up payloads another live instance is working on; the
    /// store's uuid deduplication absorbs the resulting duplicate delivery.
    async fn recover_in_flight(&self) -> Result<usize, QueueError> {
        let processing = self.processing_key();
        let mut recovered = 0;

        while let Some(raw) = self.pool.last(&processing).await.map_err(Self::map_error)? {
            let moved = match Self::recovered_entry(&raw) {
                Ok(entry) => self
                    .pool
                    .replace_between(&processing, &raw, &self.ready_key(), &entry)
                    .await
                    .map_err(Self::map_error)?,
                Err(e) => {
                    tracing::warn!(error = %e, "Dead-lettering undecodable in-flight entry");
                    self.pool
                        .replace_between(&processing, &raw, &self.dead_key(), &raw)
                        .await
                        .map_err(Self::map_error)?;
                    false
                }
            };

            if moved {
                recovered += 1;
            }
        }

        if recovered > 0 {
            tracing::info!(recovered = recovered, "Recovered in-flight payloads from Redis");
        }
        Ok(recovered)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let ready = self.pool.llen(&self.ready_key()).await.map_err(Self::map_error)?;
        let in_flight = self
            .pool
            .llen(&self.processing_key())
            .await
            .map_err(Self::map_error)?;
        let dead_lettered = self.pool.llen(&self.dead_key()).await.map_err(Self::map_error)?;

        Ok(QueueStats {
            backend: "redis".to_string(),
            ready,
            in_flight,
            dead_lettered,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        tracing::info!(prefix = %self.prefix, "Redis dispatch queue closed");
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
