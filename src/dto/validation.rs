//! Validation helpers for DTOs.

use validator::ValidationError;

/// Validates that a room code is 4 to 16 lowercase alphanumeric characters,
/// with `-` allowed as a separator.
///
/// # Examples
///
/// ```ignore
/// validate_room_code("friday-night") // Ok
/// validate_room_code("Trivia")       // Err - uppercase
/// validate_room_code("ab")           // Err - too short
/// ```
pub fn validate_room_code(code: &str) -> Result<(), ValidationError> {
    if !(4..=16).contains(&code.len()) {
        let mut err = ValidationError::new("room_code_length");
        err.message =
            Some(format!("Room code must be 4 to 16 characters (got {})", code.len()).into());
        return Err(err);
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        let mut err = ValidationError::new("room_code_format");
        err.message =
            Some("Room code must contain only lowercase letters, digits and '-'".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_room_code_valid() {
        assert!(validate_room_code("quiz").is_ok());
        assert!(validate_room_code("friday-night-42").is_ok());
        assert!(validate_room_code("0000").is_ok());
    }

    #[test]
    fn test_validate_room_code_invalid_length() {
        assert!(validate_room_code("abc").is_err()); // too short
        assert!(validate_room_code("a-very-long-room-code").is_err()); // too long
        assert!(validate_room_code("").is_err()); // empty
    }

    #[test]
    fn test_validate_room_code_invalid_format() {
        assert!(validate_room_code("Quiz").is_err()); // uppercase
        assert!(validate_room_code("quiz night").is_err()); // space
        assert!(validate_room_code("quiz_night").is_err()); // underscore
        assert!(validate_room_code("caf\u{e9}-quiz").is_err()); // non-ascii
    }
}
