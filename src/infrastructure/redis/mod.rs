//! Redis connectivity
//!
//! - `RedisPool`: shared multiplexed connection with lazy reconnect
//! - `RedisPoolExt`: list commands used by the dispatch queue
//! - `ExponentialBackoff`: jittered delays for retry loops

mod backoff;
pub mod pool;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use pool::{PoolError, RedisPool, RedisPoolExt};
