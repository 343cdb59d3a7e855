//! Queue data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data carried from the dispatcher to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchPayload {
    /// Idempotency key: the uuid the persisted message will carry.
    /// Absent in payloads from publishers that predate it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Validated message text
    pub text: String,
}

impl DispatchPayload {
    pub fn new(uuid: Uuid, text: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid),
            text: text.into(),
        }
    }
}

/// A payload as it sits in the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedDispatch {
    pub payload: DispatchPayload,
    /// Deliveries made so far
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueuedDispatch {
    pub fn new(payload: DispatchPayload) -> Self {
        Self {
            payload,
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// One delivery of a payload to a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub payload: DispatchPayload,
    /// 1 for the first delivery, incremented on every redelivery
    pub attempt: u32,
    pub enqueued_at: DateTime<Utc>,
    /// Backend handle used to ack/nack this delivery
    pub(crate) receipt: String,
}

impl Delivery {
    pub fn receipt(&self) -> &str {
        &self.receipt
    }
}

/// A payload the consumer gave up on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetter {
    pub dispatch: QueuedDispatch,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// Queue depth snapshot.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    pub backend: String,
    pub ready: usize,
    pub in_flight: usize,
    pub dead_lettered: usize,
}
