//! Text validation shared by every `Message` constructor and mutator.

use thiserror::Error;

/// Maximum text length, in characters. Matches the `VARCHAR(255)` column.
pub const TEXT_MAX_LENGTH: usize = 255;

const VALIDATION_MESSAGE: &str = "Text must not be empty or exceed 255 characters.";

/// Raised when message text fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Text must not be empty or exceed 255 characters.")]
pub struct ValidationError;

impl ValidationError {
    /// The user-facing message carried by every validation failure.
    pub fn message(&self) -> &'static str {
        VALIDATION_MESSAGE
    }
}

/// Returns true iff `text` has visible content and fits the column.
///
/// Length is counted in characters, the same unit PostgreSQL uses for
/// `VARCHAR(n)`, so anything accepted here is accepted by the store.
pub fn is_valid_text(text: &str) -> bool {
    !text.trim().is_empty() && text.chars().count() <= TEXT_MAX_LENGTH
}

/// `is_valid_text` lifted into a `Result`.
pub fn validate_text(text: &str) -> Result<(), ValidationError> {
    if is_valid_text(text) {
        Ok(())
    } else {
        Err(ValidationError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_regular_text() {
        assert!(is_valid_text("Hello World"));
        assert!(is_valid_text("x"));
        assert!(is_valid_text("  padded  "));
    }

    #[test]
    fn test_rejects_empty_and_whitespace() {
        assert!(!is_valid_text(""));
        assert!(!is_valid_text("   "));
        assert!(!is_valid_text("\t\n"));
    }

    #[test]
    fn test_length_boundary() {
        assert!(is_valid_text(&"a".repeat(TEXT_MAX_LENGTH)));
        assert!(!is_valid_text(&"a".repeat(TEXT_MAX_LENGTH + 1)));
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 255 two-byte characters: 510 bytes, still within the column limit
        let text = "é".repeat(TEXT_MAX_LENGTH);
        assert!(text.len() > TEXT_MAX_LENGTH);
        assert!(is_valid_text(&text));
    }

    #[test]
    fn test_error_message() {
        let err = validate_text("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Text must not be empty or exceed 255 characters."
        );
        assert_eq!(err.message(), err.to_string());
    }
}
