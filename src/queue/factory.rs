//! Dispatch queue factory

use std::sync::Arc;
use std::time::Duration;

use crate::config::QueueConfig;
use crate::redis::RedisPool;

use super::backend::DispatchQueue;
use super::memory_backend::MemoryDispatchQueue;
use super::redis_backend::RedisDispatchQueue;

/// Create a dispatch queue based on configuration.
///
/// - `"redis"`: `RedisDispatchQueue` if a Redis pool is provided
/// - `"memory"` (default): `MemoryDispatchQueue`
pub fn create_dispatch_queue(
    settings: &QueueConfig,
    redis_pool: Option<Arc<RedisPool>>,
) -> Arc<dyn DispatchQueue> {
    match settings.backend.as_str() {
        "redis" => {
            if let Some(pool) = redis_pool {
                tracing::info!(
                    backend = "redis",
                    prefix = %settings.redis_prefix,
                    "Creating Redis dispatch queue"
                );
                Arc::new(RedisDispatchQueue::new(
                    pool,
                    settings.redis_prefix.clone(),
                    Duration::from_millis(settings.poll_interval_ms),
                ))
            } else {
                tracing::warn!(
                    "Redis queue requested but no pool provided, falling back to memory"
                );
                Arc::new(MemoryDispatchQueue::new())
            }
        }
        _ => {
            tracing::info!(backend = "memory", "Creating memory dispatch queue");
            Arc::new(MemoryDispatchQueue::new())
        }
    }
}
