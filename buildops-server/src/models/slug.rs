//! Workspace slug validation
//!
//! Matches DB constraint: ^[a-z0-9-]{2,50}$

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

const MIN_SLUG_LEN: usize = 2;
const MAX_SLUG_LEN: usize = 50;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9-]+$").expect("invalid slug regex"));

/// Validated tenant slug (workspace URL segment)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slug(String);

impl Slug {
    /// # Example
    /// ```
    /// use buildops_server::models::Slug;
    ///
    /// assert!(Slug::new("acme-builders").is_ok());
    /// assert!(Slug::new("Acme").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if s.is_empty() {
            return Err(ValidationError::Empty { field: "slug" });
        }
        if s.len() < MIN_SLUG_LEN {
            return Err(ValidationError::TooShort {
                field: "slug",
                min: MIN_SLUG_LEN,
            });
        }
        if s.len() > MAX_SLUG_LEN {
            return Err(ValidationError::TooLong {
                field: "slug",
                max: MAX_SLUG_LEN,
            });
        }
        if !SLUG_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "slug",
                reason: "can only contain lowercase letters, numbers, and hyphens",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn valid_slugs() {
        assert!(Slug::new("ab").is_ok());
        assert!(Slug::new("rgv-homes-2").is_ok());
        assert!(Slug::new(&"a".repeat(50)).is_ok());
    }

    #[test]
    fn invalid_slugs() {
        assert!(matches!(Slug::new(""), Err(ValidationError::Empty { .. })));
        assert!(matches!(Slug::new("a"), Err(ValidationError::TooShort { .. })));
        assert!(matches!(
            Slug::new(&"a".repeat(51)),
            Err(ValidationError::TooLong { max: 50, .. })
        ));
        assert!(matches!(
            Slug::new("has space"),
            Err(ValidationError::InvalidFormat { .. })
        ));
        assert!(matches!(
            Slug::new("under_score"),
            Err(ValidationError::InvalidFormat { .. })
        ));
    }

    proptest! {
        #[test]
        fn accepts_every_well_formed_slug(s in "[a-z0-9-]{2,50}") {
            let slug = Slug::new(&s).unwrap();
            prop_assert_eq!(slug.as_str(), s.as_str());
        }

        #[test]
        fn rejects_uppercase(prefix in "[a-z0-9]{1,10}", upper in "[A-Z]") {
            let candidate = format!("{prefix}{upper}");
            prop_assert!(
                matches!(
                    Slug::new(&candidate),
                    Err(ValidationError::InvalidFormat { .. })
                ),
                "expected InvalidFormat for {candidate:?}"
            );
        }
    }
}
