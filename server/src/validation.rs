use crate::error::ApiError;

/// Maximum text length for TTS requests
pub const MAX_TEXT_LENGTH: usize = 5000;

pub const MISSING_TEXT: &str = "Missing \"text\" parameter";

/// Validate the text of a TTS request and return it.
///
/// Absent, empty and whitespace-only text are all reported as missing.
pub fn validate_tts_text(text: Option<&str>) -> Result<&str, ApiError> {
    let text = match text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Err(ApiError::InvalidInput(MISSING_TEXT.to_string())),
    };

    if text.chars().count() > MAX_TEXT_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Text too long (max {} characters)",
            MAX_TEXT_LENGTH
        )));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tts_text_valid() {
        assert_eq!(validate_tts_text(Some("Hello")).unwrap(), "Hello");
        assert!(validate_tts_text(Some("A paz esteja com você")).is_ok());
    }

    #[test]
    fn test_validate_tts_text_missing() {
        for input in [None, Some(""), Some("   ")] {
            match validate_tts_text(input) {
                Err(ApiError::InvalidInput(msg)) => assert_eq!(msg, MISSING_TEXT),
                other => panic!("expected missing text error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_validate_tts_text_too_long() {
        let long_text = "a".repeat(6000);
        let result = validate_tts_text(Some(&long_text));
        if let Err(ApiError::InvalidInput(msg)) = result {
            assert!(msg.contains("too long"));
        } else {
            panic!("expected too long error");
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 5000 two-byte characters is still within the limit
        let text = "ç".repeat(MAX_TEXT_LENGTH);
        assert!(validate_tts_text(Some(&text)).is_ok());
    }
}
