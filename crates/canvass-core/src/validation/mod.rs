//! Input validation and normalization for account data.
//!
//! Everything that reaches the user or role stores passes through here first.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use validator::ValidateEmail;

/// Validation error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Input exceeds maximum allowed length.
    #[error("{field} exceeds maximum length ({max} bytes, got {actual})")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
        /// Actual input length.
        actual: usize,
    },

    /// Input is shorter than required.
    #[error("{field} must be at least {min} characters")]
    TooShort {
        /// Field name.
        field: &'static str,
        /// Minimum length.
        min: usize,
    },

    /// Email address is not well-formed.
    #[error("Invalid email address")]
    InvalidEmail,

    /// Disallowed characters in input.
    #[error("Disallowed characters in {0}")]
    DisallowedChars(&'static str),
}

/// Size limits per input type.
pub mod limits {
    /// Maximum email length (RFC 5321 path limit).
    pub const MAX_EMAIL_LENGTH: usize = 254;

    /// Minimum password length.
    pub const MIN_PASSWORD_LENGTH: usize = 8;

    /// Maximum password length; argon2 input is bounded to keep hashing cheap to reject.
    pub const MAX_PASSWORD_LENGTH: usize = 1024;

    /// Maximum length for names, phone numbers and similar short fields.
    pub const MAX_SHORT_TEXT: usize = 128;

    /// Maximum avatar URL length.
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Maximum permission string length.
    pub const MAX_PERMISSION_LENGTH: usize = 128;
}

/// Normalize an email address for lookup: trim, NFKC, lowercase.
#[must_use]
pub fn normalize_email(input: &str) -> String {
    input.trim().nfkc().collect::<String>().to_lowercase()
}

/// Normalize and validate an email address.
///
/// # Errors
///
/// Returns `ValidationError::InvalidEmail` or `TooLong` for bad input.
pub fn validate_email(input: &str) -> Result<String, ValidationError> {
    let email = normalize_email(input);
    if email.len() > limits::MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong {
            field: "email",
            max: limits::MAX_EMAIL_LENGTH,
            actual: email.len(),
        });
    }
    if !email.as_str().validate_email() {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(email)
}

/// Check password length bounds. The password itself is never altered.
///
/// # Errors
///
/// Returns `TooShort` or `TooLong`.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < limits::MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password",
            min: limits::MIN_PASSWORD_LENGTH,
        });
    }
    if password.len() > limits::MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password",
            max: limits::MAX_PASSWORD_LENGTH,
            actual: password.len(),
        });
    }
    Ok(())
}

/// Sanitize a free-text field (display name, phone, localized role name).
///
/// Performs:
/// 1. Trim and length check
/// 2. Strip control characters
/// 3. Unicode normalization (NFKC)
///
/// # Errors
///
/// Returns `ValidationError::TooLong` if input exceeds `max_len`.
pub fn sanitize_text(
    field: &'static str,
    input: &str,
    max_len: usize,
) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.len() > max_len {
        return Err(ValidationError::TooLong {
            field,
            max: max_len,
            actual: trimmed.len(),
        });
    }

    let sanitized: String = trimmed.chars().filter(|c| !c.is_control()).collect();
    Ok(sanitized.nfkc().collect())
}

/// Validate a login/username or role name: non-empty, no whitespace or control chars.
///
/// # Errors
///
/// Returns `TooShort`, `TooLong` or `DisallowedChars`.
pub fn validate_identifier(field: &'static str, input: &str) -> Result<String, ValidationError> {
    let value: String = input.trim().nfkc().collect();
    if value.is_empty() {
        return Err(ValidationError::TooShort { field, min: 1 });
    }
    if value.len() > limits::MAX_SHORT_TEXT {
        return Err(ValidationError::TooLong {
            field,
            max: limits::MAX_SHORT_TEXT,
            actual: value.len(),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::DisallowedChars(field));
    }
    Ok(value)
}

/// Validate a permission string. Permissions are opaque and compared exactly,
/// so only printable ASCII without spaces is accepted.
///
/// # Errors
///
/// Returns `TooShort`, `TooLong` or `DisallowedChars`.
pub fn validate_permission(input: &str) -> Result<&str, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::TooShort {
            field: "permission",
            min: 1,
        });
    }
    if input.len() > limits::MAX_PERMISSION_LENGTH {
        return Err(ValidationError::TooLong {
            field: "permission",
            max: limits::MAX_PERMISSION_LENGTH,
            actual: input.len(),
        });
    }
    if !input.chars().all(|c| c.is_ascii_graphic()) {
        return Err(ValidationError::DisallowedChars("permission"));
    }
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.ORG "), "ana@example.org");
    }

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("Leader@Campaign.org").unwrap(), "leader@campaign.org");
        assert_eq!(validate_email("not-an-email"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email(""), Err(ValidationError::InvalidEmail));

        let long = format!("{}@example.org", "a".repeat(300));
        assert!(matches!(validate_email(&long), Err(ValidationError::TooLong { .. })));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct horse").is_ok());
        assert!(matches!(
            validate_password("short"),
            Err(ValidationError::TooShort { .. })
        ));
        assert!(matches!(
            validate_password(&"x".repeat(2000)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("name", " Ana\u{0}Lucía ", 64).unwrap(), "AnaLucía");
        assert_eq!(sanitize_text("name", "\u{FB01}", 64).unwrap(), "fi");
        assert!(sanitize_text("name", &"x".repeat(65), 64).is_err());
    }

    #[test]
    fn test_validate_identifier() {
        assert_eq!(validate_identifier("username", " ana ").unwrap(), "ana");
        assert!(validate_identifier("username", "").is_err());
        assert_eq!(
            validate_identifier("username", "ana maria"),
            Err(ValidationError::DisallowedChars("username"))
        );
    }

    #[test]
    fn test_validate_permission() {
        assert!(validate_permission("users.read").is_ok());
        assert!(validate_permission("users read").is_err());
        assert!(validate_permission("").is_err());
        assert!(validate_permission("usuarios.leer").is_ok());
        assert!(validate_permission("usuários").is_err());
    }
}
