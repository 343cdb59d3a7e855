// Infrastructure layer (shared components)
pub mod infrastructure;

pub use infrastructure::metrics;
pub use infrastructure::postgres;
pub use infrastructure::redis;

pub mod config;
pub mod error;

// Domain layer
pub mod dispatch;
pub mod message;
pub mod queue;
pub mod store;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod fixtures;
pub mod shutdown;
pub mod telemetry;
