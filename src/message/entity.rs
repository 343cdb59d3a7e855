//! The `Message` entity.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::status::MessageStatus;
use super::validation::{validate_text, ValidationError};

/// One user-submitted text and its lifecycle state.
///
/// `uuid` and `created_at` are fixed at construction. `id` is assigned by the
/// store and is `None` for messages that have not been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    id: Option<i64>,
    uuid: Uuid,
    text: String,
    status: Option<MessageStatus>,
    created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message with a fresh v4 uuid and the current time.
    pub fn new(text: impl Into<String>) -> Result<Self, ValidationError> {
        Self::with_uuid(Uuid::new_v4(), text)
    }

    /// Create a message whose uuid was generated upstream.
    ///
    /// Used by the consumer so a redelivered payload maps to the same record.
    pub fn with_uuid(uuid: Uuid, text: impl Into<String>) -> Result<Self, ValidationError> {
        let text = text.into();
        validate_text(&text)?;

        Ok(Self {
            id: None,
            uuid,
            text,
            status: None,
            created_at: Utc::now(),
        })
    }

    /// Rebuild a message from stored columns.
    pub(crate) fn restore(
        id: i64,
        uuid: Uuid,
        text: String,
        status: Option<MessageStatus>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_text(&text)?;

        Ok(Self {
            id: Some(id),
            uuid,
            text,
            status,
            created_at,
        })
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> Option<MessageStatus> {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Replace the status. No transition rules are applied.
    pub fn set_status(&mut self, status: Option<MessageStatus>) -> &mut Self {
        self.status = status;
        self
    }

    /// Replace the text wholesale, re-running validation.
    ///
    /// On failure the previous text is kept.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<&mut Self, ValidationError> {
        let text = text.into();
        validate_text(&text)?;
        self.text = text;
        Ok(self)
    }

    pub(crate) fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }
}
