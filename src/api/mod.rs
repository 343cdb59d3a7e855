//! API layer - HTTP endpoint handlers.

mod health;
mod messages;
mod metrics;
mod routes;

pub use health::{health, HealthResponse, QueueHealthResponse, StoreHealthResponse};
pub use messages::{list_messages, send_message, ListMessagesParams, SendMessageResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
