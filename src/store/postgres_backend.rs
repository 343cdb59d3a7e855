//! PostgreSQL message store.
//!
//! Table layout:
//! - `id` BIGSERIAL surrogate key (internal)
//! - `uuid` UUID, unique; the idempotency key for consumer inserts
//! - `text` VARCHAR(255)
//! - `status` nullable VARCHAR holding `SENT` / `READ`
//! - `created_at` TIMESTAMPTZ

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::message::{Message, MessageStatus};

use super::backend::{InsertOutcome, MessageFilter, MessageStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    id BIGSERIAL PRIMARY KEY,
    uuid UUID NOT NULL UNIQUE,
    text VARCHAR(255) NOT NULL,
    status VARCHAR(255) NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS idx_messages_status ON messages (status);
"#;

type MessageRow = (i64, Uuid, String, Option<String>, DateTime<Utc>);

/// `MessageStore` backed by a PostgreSQL table.
pub struct PostgresMessageStore {
    pool: PgPool,
}

impl PostgresMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `messages` table and its status index if missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("Messages schema ensured");
        Ok(())
    }

    fn row_to_message(row: MessageRow) -> Result<Message, StoreError> {
        let (id, uuid, text, status, created_at) = row;

        let status = status
            .map(|raw| raw.parse::<MessageStatus>())
            .transpose()
            .map_err(|e| StoreError::Corrupt {
                uuid,
                reason: format!("unknown status {:?}", e.value),
            })?;

        Message::restore(id, uuid, text, status, created_at).map_err(|e| StoreError::Corrupt {
            uuid,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, message: &Message) -> Result<InsertOutcome, StoreError> {
        // ON CONFLICT makes concurrent redeliveries collapse into one row
        let inserted: Option<(i64,)> = sqlx::query_as(
            r#"
            INSERT INTO messages (uuid, text, status, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (uuid) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(message.uuid())
        .bind(message.text())
        .bind(message.status().map(|s| s.as_str()))
        .bind(message.created_at())
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some((id,)) => {
                tracing::trace!(uuid = %message.uuid(), id = id, "Message inserted");
                Ok(InsertOutcome::Inserted { id })
            }
            None => {
                tracing::debug!(uuid = %message.uuid(), "Duplicate insert ignored");
                Ok(InsertOutcome::Duplicate)
            }
        }
    }

    async fn query(&self, filter: &MessageFilter) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, uuid, text, status, created_at
            FROM messages
            WHERE ($1::VARCHAR IS NULL OR status = $1)
            ORDER BY id ASC
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_message).collect()
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as usize)
    }
}
