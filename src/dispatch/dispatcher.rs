//! Submission path: validate, enqueue, return.

use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, Result};
use crate::message::Message;
use crate::metrics::DispatchMetrics;
use crate::queue::{DispatchPayload, DispatchQueue};

pub const INVALID_TEXT_MESSAGE: &str = "Invalid text parameter. Must be a non-empty string.";

/// Accepts raw submissions and hands them to the dispatch queue.
pub struct Dispatcher {
    queue: Arc<dyn DispatchQueue>,
}

impl Dispatcher {
    pub fn new(queue: Arc<dyn DispatchQueue>) -> Self {
        Self { queue }
    }

    /// Validate `raw_body` and enqueue its text.
    ///
    /// Returns the enqueued payload once the queue has accepted it. The
    /// payload's uuid is the one the persisted message will carry.
    #[tracing::instrument(name = "dispatcher.send", skip_all, fields(body_len = raw_body.len()))]
    pub async fn send(&self, raw_body: &[u8]) -> Result<DispatchPayload> {
        let Some(text) = extract_text(raw_body) else {
            DispatchMetrics::record_rejected();
            return Err(AppError::bad_request(INVALID_TEXT_MESSAGE));
        };

        // Built only to run the entity's validation and mint the uuid
        let message = Message::new(text).inspect_err(|_| DispatchMetrics::record_rejected())?;

        let payload = DispatchPayload::new(message.uuid(), message.text());
        self.queue.enqueue(payload.clone()).await?;
        DispatchMetrics::record_enqueued();

        tracing::info!(uuid = %message.uuid(), "Message queued for dispatch");
        Ok(payload)
    }
}

/// The `text` field of a JSON object body, if it is a non-empty string.
fn extract_text(raw_body: &[u8]) -> Option<String> {
    let body: Value = serde_json::from_slice(raw_body).ok()?;

    match body.as_object()?.get("text")? {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        _ => None,
    }
}
