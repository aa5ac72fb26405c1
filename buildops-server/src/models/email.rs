//! Email address validation

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::ValidationError;

const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
});

/// Validated, lower-cased email address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Trim, lower-case and check the `local@domain.tld` shape.
    ///
    /// # Example
    /// ```
    /// use buildops_server::models::Email;
    ///
    /// assert_eq!(Email::new(" Ana@Example.COM ").unwrap().as_str(), "ana@example.com");
    /// assert!(Email::new("not-an-email").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "email" });
        }
        if normalized.len() > MAX_EMAIL_LEN {
            return Err(ValidationError::TooLong {
                field: "email",
                max: MAX_EMAIL_LEN,
            });
        }
        if !EMAIL_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "email",
                reason: "must be a valid email address",
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate an optional contact email; blank input counts as absent.
pub fn optional_email(value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Email::new(raw).map(|e| Some(e.into_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case_and_whitespace() {
        let email = Email::new("  Owner@BuildOps.IO ").unwrap();
        assert_eq!(email.as_str(), "owner@buildops.io");
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(matches!(Email::new(""), Err(ValidationError::Empty { .. })));
        assert!(Email::new("no-at-sign.com").is_err());
        assert!(Email::new("a@b").is_err());
        assert!(Email::new("a b@c.com").is_err());
    }

    #[test]
    fn rejects_overlong() {
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(Email::new(&long), Err(ValidationError::TooLong { .. })));
    }

    #[test]
    fn optional_blank_is_none() {
        assert_eq!(optional_email(Some("  ")).unwrap(), None);
        assert_eq!(optional_email(None).unwrap(), None);
        assert_eq!(
            optional_email(Some("X@Y.com")).unwrap().as_deref(),
            Some("x@y.com")
        );
    }
}
