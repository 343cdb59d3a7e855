//! Dispatch queue between the submission endpoint and the consumer.
//!
//! # Delivery semantics
//!
//! Delivery is at-least-once. A dequeued payload stays "in flight" until the
//! consumer acknowledges it; a negative acknowledgement or a crashed worker
//! puts it back on the ready list. Consumers must therefore tolerate
//! duplicates, which the store handles by deduplicating on the payload uuid.
//!
//! # Backends
//!
//! - `MemoryDispatchQueue`: process-local FIFO (default)
//! - `RedisDispatchQueue`: reliable-queue pattern over Redis lists
//!
//! Use `create_dispatch_queue()` to pick a backend from configuration.

pub mod backend;
mod factory;
pub mod memory_backend;
mod models;
pub mod redis_backend;

pub use backend::{DispatchQueue, QueueError};
pub use factory::create_dispatch_queue;
pub use memory_backend::MemoryDispatchQueue;
pub use models::{DeadLetter, Delivery, DispatchPayload, QueueStats, QueuedDispatch};
pub use redis_backend::RedisDispatchQueue;
