//! Message domain model.
//!
//! A `Message` is one user-submitted text together with its client-facing
//! uuid, processing status and creation time. Text constraints are enforced
//! by every constructor and by `Message::set_text`.

mod entity;
mod status;
mod validation;

pub use entity::Message;
pub use status::{MessageStatus, ParseStatusError};
pub use validation::{is_valid_text, validate_text, ValidationError, TEXT_MAX_LENGTH};
