//! Infrastructure layer modules
//!
//! Shared components used by the domain backends:
//! - `metrics`: Prometheus metrics and helpers
//! - `postgres`: PostgreSQL connection pool
//! - `redis`: Redis connection pool and reconnection backoff

pub mod metrics;
pub mod postgres;
pub mod redis;
