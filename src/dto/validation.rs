//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest identifier accepted from clients.
const MAX_IDENTIFIER_LEN: usize = 64;

/// Rejects values made only of whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Validates an opaque identifier: non-empty, bounded and free of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_identifier("4f1c2a5e-9d0b-4bd8-8a39-0b2f6f1e7c11") // Ok
/// validate_identifier("ABCD1234")                             // Ok
/// validate_identifier("two words")                            // Err - whitespace
/// ```
pub fn validate_identifier(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() || id.len() > MAX_IDENTIFIER_LEN {
        let mut err = ValidationError::new("identifier_length");
        err.message = Some(
            format!(
                "Identifier must be between 1 and {MAX_IDENTIFIER_LEN} characters (got {})",
                id.len()
            )
            .into(),
        );
        return Err(err);
    }

    if id.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("identifier_format");
        err.message = Some("Identifier must not contain whitespace".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Sprint 1").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t ").is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("ABCD1234").is_ok());
        assert!(validate_identifier("4f1c2a5e-9d0b-4bd8-8a39-0b2f6f1e7c11").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("two words").is_err());
        assert!(validate_identifier(&"x".repeat(65)).is_err());
    }
}
