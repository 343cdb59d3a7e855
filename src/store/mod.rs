//! Message persistence.
//!
//! The store is the only serialization point for concurrent consumers:
//! inserts are first-write-wins keyed by message uuid, so a payload delivered
//! more than once still yields a single queryable record.
//!
//! - `MemoryMessageStore`: process-local storage (default, tests, development)
//! - `PostgresMessageStore`: `messages` table via sqlx
//!
//! Use `create_message_store()` to pick a backend from configuration.

pub mod backend;
mod factory;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::{InsertOutcome, MessageFilter, MessageStore, StoreError};
pub use factory::create_message_store;
pub use memory_backend::MemoryMessageStore;
pub use postgres_backend::PostgresMessageStore;
