//! Redis connection pool for the dispatch queue.
//!
//! Holds one multiplexed connection shared by every task. A dropped
//! connection is discarded and re-established on the next command.

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

/// Error type for Redis pool operations.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Redis operation failed
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    /// Connection not available
    #[error("Connection not available: {0}")]
    ConnectionUnavailable(String),
}

/// Redis connection pool for command traffic.
///
/// Only non-blocking commands go through this pool; a blocking command would
/// stall every other request multiplexed on the same connection.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    config: RedisConfig,
}

impl RedisPool {
    /// Create a new Redis pool. No connection is opened until first use.
    pub fn new(config: RedisConfig) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            config,
        })
    }

    /// Get the shared connection, connecting if necessary.
    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut conn_guard = self.connection.write().await;

        // Double-check in case another task connected while we waited
        if let Some(ref c) = *conn_guard {
            return Ok(c.clone());
        }

        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                *conn_guard = Some(conn.clone());
                tracing::info!("Redis pool connection established");
                Ok(conn)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run a command against the shared connection.
    ///
    /// Connection-level failures clear the cached connection so the next
    /// call reconnects.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: std::future::Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => Ok(result),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    let mut conn_guard = self.connection.write().await;
                    *conn_guard = None;
                    tracing::warn!(error = %e, "Redis connection dropped");
                }
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Get the Redis URL (for debugging).
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Ping Redis to check connectivity.
    pub async fn ping(&self) -> Result<(), PoolError> {
        self.execute(|mut conn| async move {
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }
}

/// LREM one occurrence from KEYS[1]; LPUSH ARGV[2] onto KEYS[2] only if
/// something was removed.
const REPLACE_BETWEEN_SCRIPT: &str = r"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
if removed == 0 then
    return 0
end
redis.call('LPUSH', KEYS[2], ARGV[2])
return 1
";

/// List commands used by the reliable dispatch queue.
#[async_trait::async_trait]
pub trait RedisPoolExt {
    /// Push to the head of a list. Returns the new length.
    async fn lpush(&self, key: &str, value: &str) -> Result<usize, PoolError>;

    /// Atomically pop the tail of `source` and push it to the head of
    /// `destination`. `None` when `source` is empty.
    async fn lmove_tail_to_head(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Option<String>, PoolError>;

    /// Remove one occurrence of `value`. Returns the number removed.
    async fn lrem_one(&self, key: &str, value: &str) -> Result<usize, PoolError>;

    /// Atomically remove one `value` from `from` and, only if it was there,
    /// push `replacement` onto `to`. Returns whether the move happened.
    async fn replace_between(
        &self,
        from: &str,
        value: &str,
        to: &str,
        replacement: &str,
    ) -> Result<bool, PoolError>;

    /// Last element of a list, if any.
    async fn last(&self, key: &str) -> Result<Option<String>, PoolError>;

    /// Length of a list.
    async fn llen(&self, key: &str) -> Result<usize, PoolError>;
}

#[async_trait::async_trait]
impl RedisPoolExt for RedisPool {
    async fn lpush(&self, key: &str, value: &str) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("LPUSH")
                .arg(key)
                .arg(value)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn lmove_tail_to_head(
        &self,
        source: &str,
        destination: &str,
    ) -> Result<Option<String>, PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("LMOVE")
                .arg(source)
                .arg(destination)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn lrem_one(&self, key: &str, value: &str) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("LREM")
                .arg(key)
                .arg(1)
                .arg(value)
                .query_async(&mut conn)
                .await
        })
        .await
    }

    async fn replace_between(
        &self,
        from: &str,
        value: &str,
        to: &str,
        replacement: &str,
    ) -> Result<bool, PoolError> {
        self.execute(|mut conn| async move {
            let moved: i64 = redis::Script::new(REPLACE_BETWEEN_SCRIPT)
                .key(from)
                .key(to)
                .arg(value)
                .arg(replacement)
                .invoke_async(&mut conn)
                .await?;
            Ok(moved == 1)
        })
        .await
    }

    async fn last(&self, key: &str) -> Result<Option<String>, PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("LINDEX").arg(key).arg(-1).query_async(&mut conn).await
        })
        .await
    }

    async fn llen(&self, key: &str) -> Result<usize, PoolError> {
        self.execute(|mut conn| async move {
            redis::cmd("LLEN").arg(key).query_async(&mut conn).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_creation_is_lazy() {
        // Client::open only parses the URL; no server is needed
        let pool = RedisPool::new(RedisConfig {
            url: "redis://localhost:6379".to_string(),
        })
        .unwrap();
        assert_eq!(pool.url(), "redis://localhost:6379");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let result = RedisPool::new(RedisConfig {
            url: "not-a-redis-url".to_string(),
        });
        assert!(matches!(result, Err(PoolError::Redis(_))));
    }
}
