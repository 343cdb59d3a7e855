//! Store backend factory

use std::sync::Arc;

use crate::config::{DatabaseConfig, StoreConfig};
use crate::postgres::PostgresPool;

use super::backend::{MessageStore, StoreError};
use super::memory_backend::MemoryMessageStore;
use super::postgres_backend::PostgresMessageStore;

/// Create a message store based on configuration.
///
/// - `"postgres"`: `PostgresMessageStore` if a pool is provided
/// - `"memory"` (default): `MemoryMessageStore`
///
/// Runs the schema bootstrap when `database.run_migrations` is set.
pub async fn create_message_store(
    settings: &StoreConfig,
    database: &DatabaseConfig,
    postgres_pool: Option<&PostgresPool>,
) -> Result<Arc<dyn MessageStore>, StoreError> {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(
                    backend = "postgres",
                    database = %pool.database_url_masked(),
                    "Creating PostgreSQL message store"
                );
                let store = PostgresMessageStore::new(pool.pool().clone());
                if database.run_migrations {
                    store.ensure_schema().await?;
                }
                Ok(Arc::new(store))
            } else {
                tracing::warn!(
                    "PostgreSQL store requested but no pool provided, falling back to memory"
                );
                Ok(Arc::new(MemoryMessageStore::new()))
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory message store");
            Ok(Arc::new(MemoryMessageStore::new()))
        }
    }
}
