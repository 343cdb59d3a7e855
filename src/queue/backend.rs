//! Backend trait for the dispatch queue.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::models::{Delivery, DispatchPayload, QueueStats};

/// Errors that can occur during queue operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been closed for shutdown
    #[error("Dispatch queue is closed")]
    Closed,

    /// Ack/nack for a delivery the queue no longer tracks
    #[error("Unknown delivery: {0}")]
    UnknownDelivery(String),

    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// At-least-once delivery channel from dispatcher to consumer.
///
/// # Thread Safety
///
/// Implementations are shared by request handlers and every worker loop,
/// so they must be `Send + Sync`.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Backend identifier for health output.
    fn backend_name(&self) -> &'static str;

    /// Append a payload. Returns once the payload is durably queued.
    async fn enqueue(&self, payload: DispatchPayload) -> Result<(), QueueError>;

    /// Take the next ready payload, waiting up to `wait`.
    ///
    /// Returns `Ok(None)` on timeout or once the queue is closed. Dropping
    /// the returned future never loses a payload.
    async fn dequeue(&self, wait: Duration) -> Result<Option<Delivery>, QueueError>;

    /// Mark a delivery as processed.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Return a delivery to the ready list for another attempt.
    async fn nack(&self, delivery: Delivery) -> Result<(), QueueError>;

    /// Park a delivery that must not be retried.
    async fn dead_letter(&self, delivery: Delivery, reason: &str) -> Result<(), QueueError>;

    /// Move deliveries left in flight by a previous run back to ready.
    ///
    /// Returns the number of payloads recovered.
    async fn recover_in_flight(&self) -> Result<usize, QueueError>;

    /// Current queue depths.
    async fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Stop handing out work and reject new payloads.
    async fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}
