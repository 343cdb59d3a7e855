//! Message processing status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Processing stage of a persisted message.
///
/// The "unset" stage is modelled as `Option::<MessageStatus>::None`; it only
/// exists for messages that were never handled by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageStatus {
    Sent,
    Read,
}

impl MessageStatus {
    /// Every recognised status, in lifecycle order.
    pub const ALL: [MessageStatus; 2] = [MessageStatus::Sent, MessageStatus::Read];

    /// Wire and column representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "SENT",
            MessageStatus::Read => "READ",
        }
    }

    fn rank(status: Option<MessageStatus>) -> u8 {
        match status {
            None => 0,
            Some(MessageStatus::Sent) => 1,
            Some(MessageStatus::Read) => 2,
        }
    }

    /// Whether moving from `current` to `self` follows `unset -> SENT -> READ`.
    ///
    /// Advisory only: `Message::set_status` accepts any value.
    pub fn is_forward_from(&self, current: Option<MessageStatus>) -> bool {
        Self::rank(Some(*self)) >= Self::rank(current)
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid status value")]
pub struct ParseStatusError {
    pub value: String,
}

impl FromStr for MessageStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError {
                value: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_values() {
        assert_eq!("SENT".parse::<MessageStatus>(), Ok(MessageStatus::Sent));
        assert_eq!("READ".parse::<MessageStatus>(), Ok(MessageStatus::Read));
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("sent".parse::<MessageStatus>().is_err());
        assert!("invalid_status".parse::<MessageStatus>().is_err());
        assert!("".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_strings() {
        assert_eq!(
            serde_json::to_string(&MessageStatus::Sent).unwrap(),
            "\"SENT\""
        );
        let none: Option<MessageStatus> = None;
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");
    }

    #[test]
    fn test_forward_transitions() {
        assert!(MessageStatus::Sent.is_forward_from(None));
        assert!(MessageStatus::Read.is_forward_from(Some(MessageStatus::Sent)));
        assert!(MessageStatus::Sent.is_forward_from(Some(MessageStatus::Sent)));
        assert!(!MessageStatus::Sent.is_forward_from(Some(MessageStatus::Read)));
    }
}
