//! In-memory message store.
//!
//! Records live for the lifetime of the process. Insertion order is kept so
//! queries are deterministic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::message::Message;

use super::backend::{InsertOutcome, MessageFilter, MessageStore, StoreError};

#[derive(Default)]
struct StoreInner {
    rows: Vec<Message>,
    /// uuid -> position in `rows`
    index: HashMap<Uuid, usize>,
    next_id: i64,
}

/// Process-local `MessageStore`.
#[derive(Default)]
pub struct MemoryMessageStore {
    inner: RwLock<StoreInner>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        let mut inner = self.inner.write().await;

        if inner.index.contains_key(&message.uuid()) {
            tracing::debug!(uuid = %message.uuid(), "Duplicate insert ignored");
            return Ok(InsertOutcome::Duplicate);
        }

        inner.next_id += 1;
        let id = inner.next_id;

        let mut stored = message.clone();
        stored.assign_id(id);

        let position = inner.rows.len();
        inner.index.insert(stored.uuid(), position);
        inner.rows.push(stored);

        Ok(InsertOutcome::Inserted { id })
    }

    async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.read().await;

        Ok(inner
            .rows
            .iter()
            .filter(|message| filter.matches(message))
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.rows.len())
    }
}
