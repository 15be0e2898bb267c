//! Shape checks for the values captured by the dialogue.

use regex::Regex;
use std::sync::LazyLock;

pub const MIN_NAME_LENGTH: usize = 2;

static EMAIL_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name must be at least {min} characters")]
    NameTooShort { min: usize },
    #[error("Email address is not valid")]
    InvalidEmail,
}

/// Trims and checks a full name, counting characters rather than bytes.
pub fn validate_full_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(ValidationError::NameTooShort {
            min: MIN_NAME_LENGTH,
        });
    }
    Ok(name.to_string())
}

/// Trims and checks that an email looks like `local@domain.tld`.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let email = input.trim();
    if !EMAIL_SHAPE.is_match(email) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_length_boundary() {
        assert!(validate_full_name("M").is_err());
        assert_eq!(validate_full_name("Mo").as_deref(), Ok("Mo"));
        assert_eq!(validate_full_name("  Maria Rossi \n").as_deref(), Ok("Maria Rossi"));
        assert!(validate_full_name("   a   ").is_err());
    }

    #[test]
    fn name_counts_characters_not_bytes() {
        assert!(validate_full_name("é").is_err());
        assert!(validate_full_name("Zoë").is_ok());
    }

    #[test]
    fn email_shape() {
        assert_eq!(validate_email("a@b.c").as_deref(), Ok("a@b.c"));
        assert_eq!(validate_email(" maria@example.com ").as_deref(), Ok("maria@example.com"));
        assert_eq!(validate_email("a@b"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("a b@c.com"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("a@@b.com"), Err(ValidationError::InvalidEmail));
    }
}
