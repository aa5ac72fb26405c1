//! Password and one-time code input rules

use super::ValidationError;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 128;

/// Plaintext password that passed length (and optionally strength) checks.
///
/// Never logged or serialized; only handed to the hasher.
pub struct Password(String);

impl Password {
    /// Minimum-length check, used when verifying a login attempt.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "password" });
        }
        if s.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::TooShort {
                field: "password",
                min: MIN_PASSWORD_LEN,
            });
        }
        if s.chars().count() > MAX_PASSWORD_LEN {
            return Err(ValidationError::TooLong {
                field: "password",
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Strength rules for new passwords: an uppercase letter, a lowercase
    /// letter and a digit.
    pub fn strong(s: &str) -> Result<Self, ValidationError> {
        let password = Self::new(s)?;
        if !s.chars().any(|c| c.is_uppercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must contain at least one uppercase letter",
            });
        }
        if !s.chars().any(|c| c.is_lowercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must contain at least one lowercase letter",
            });
        }
        if !s.chars().any(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "password",
                reason: "must contain at least one number",
            });
        }
        Ok(password)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Six-digit authenticator code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationCode(String);

impl VerificationCode {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.len() != 6 || !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "code",
                reason: "must be exactly 6 digits",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_rules() {
        assert!(matches!(Password::new(""), Err(ValidationError::Empty { .. })));
        assert!(matches!(
            Password::new("short"),
            Err(ValidationError::TooShort { min: 8, .. })
        ));
        assert!(Password::new("longenough").is_ok());
        assert!(Password::new(&"x".repeat(129)).is_err());
    }

    #[test]
    fn strength_rules() {
        assert!(Password::strong("alllowercase1").is_err());
        assert!(Password::strong("ALLUPPERCASE1").is_err());
        assert!(Password::strong("NoDigitsHere").is_err());
        assert!(Password::strong("Sturdy-Pass9").is_ok());
    }

    #[test]
    fn debug_hides_secret() {
        let p = Password::new("Sturdy-Pass9").unwrap();
        assert_eq!(format!("{:?}", p), "Password(***)");
    }

    #[test]
    fn six_digit_codes() {
        assert!(VerificationCode::new("123456").is_ok());
        assert!(VerificationCode::new(" 123456 ").is_ok());
        assert!(VerificationCode::new("12345").is_err());
        assert!(VerificationCode::new("12345a").is_err());
    }
}
