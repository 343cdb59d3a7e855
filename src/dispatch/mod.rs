//! The asynchronous dispatch pipeline.
//!
//! ```text
//! client -> Dispatcher -> DispatchQueue -> MessageConsumer -> MessageStore <- QueryService <- client
//! ```
//!
//! - `Dispatcher`: validates a submission and enqueues it, never waiting for
//!   persistence
//! - `MessageConsumer` / `ConsumerPool`: worker loops that persist queued
//!   payloads with status `SENT`
//! - `QueryService`: filtered listing of persisted messages

mod consumer;
mod dispatcher;
mod query;

pub use consumer::{ConsumeError, ConsumerPool, ConsumerSettings, DeliveryOutcome, MessageConsumer};
pub use dispatcher::{Dispatcher, INVALID_TEXT_MESSAGE};
pub use query::{MessageList, MessageView, QueryService, INVALID_STATUS_MESSAGE};
