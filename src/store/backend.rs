//! Backend trait for message persistence.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::message::{Message, MessageStatus};

/// Errors raised by store backends. Always infrastructure-side.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored row could not be turned back into a `Message`
    #[error("Corrupt record {uuid}: {reason}")]
    Corrupt { uuid: Uuid, reason: String },

    /// Backend is temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new record was written with the given surrogate id
    Inserted { id: i64 },
    /// A record with the same uuid already exists; nothing was written
    Duplicate,
}

impl InsertOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, InsertOutcome::Duplicate)
    }
}

/// Query filters, combined with AND. A `None` field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    pub status: Option<MessageStatus>,
}

impl MessageFilter {
    /// Filter that matches every message.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict results to one status.
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `message` satisfies every set field.
    pub fn matches(&self, message: &Message) -> bool {
        match self.status {
            Some(status) => message.status() == Some(status),
            None => true,
        }
    }
}

/// Persistence boundary for messages.
///
/// Implementations must be safe under concurrent inserts of the same uuid:
/// exactly one record survives and later inserts report `Duplicate`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Backend identifier for health output.
    fn backend_name(&self) -> &'static str;

    /// Persist a new message, first-write-wins by uuid.
    async fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError>;

    /// All messages matching `filter`, in insertion order.
    async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError>;

    /// Total number of stored messages.
    async fn count(&self) -> Result<usize, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_matches_everything() {
        let mut message = Message::new("Hello").unwrap();
        let filter = MessageFilter::all();

        assert!(filter.matches(&message));
        message.set_status(Some(MessageStatus::Read));
        assert!(filter.matches(&message));
    }

    #[test]
    fn test_status_filter_never_matches_unset() {
        let mut message = Message::new("Hello").unwrap();
        let filter = MessageFilter::all().with_status(MessageStatus::Sent);

        assert!(!filter.matches(&message));
        message.set_status(Some(MessageStatus::Sent));
        assert!(filter.matches(&message));
        message.set_status(Some(MessageStatus::Read));
        assert!(!filter.matches(&message));
    }
}
