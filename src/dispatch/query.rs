//! Read path: filtered listing of persisted messages.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::message::{Message, MessageStatus};
use crate::metrics::STORE_QUERIES_TOTAL;
use crate::store::{MessageFilter, MessageStore};

pub const INVALID_STATUS_MESSAGE: &str = "Invalid status value";

/// Public shape of one message. Surrogate id and timestamp stay internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub uuid: Uuid,
    pub text: String,
    pub status: Option<MessageStatus>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            uuid: message.uuid(),
            text: message.text().to_string(),
            status: message.status(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageList {
    pub messages: Vec<MessageView>,
}

pub struct QueryService {
    store: Arc<dyn MessageStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// List messages, optionally restricted to one status.
    ///
    /// An absent or empty `status` lists everything; anything else that is
    /// not a known status is rejected before the store is touched.
    #[tracing::instrument(name = "query.list", skip(self))]
    pub async fn list(&self, status: Option<&str>) -> Result<MessageList> {
        let filter = match status.filter(|s| !s.is_empty()) {
            None => MessageFilter::all(),
            Some(raw) => {
                let status: MessageStatus = raw
                    .parse()
                    .map_err(|_| AppError::bad_request(INVALID_STATUS_MESSAGE))?;
                MessageFilter::all().with_status(status)
            }
        };

        STORE_QUERIES_TOTAL.inc();
        let messages = self.store.query(&filter).await?;

        Ok(MessageList {
            messages: messages.iter().map(MessageView::from).collect(),
        })
    }
}
