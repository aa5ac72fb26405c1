//! URL and colour inputs (logos, websites, avatars, brand colours)

use once_cell::sync::Lazy;
use regex::Regex;

use super::ValidationError;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/?#]+[^\s]*$").expect("invalid url regex"));
static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("invalid colour regex"));

const MAX_URL_LEN: usize = 2048;

/// Absolute http(s) URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebUrl(String);

impl WebUrl {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::Empty { field });
        }
        if s.len() > MAX_URL_LEN {
            return Err(ValidationError::TooLong {
                field,
                max: MAX_URL_LEN,
            });
        }
        if !URL_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field,
                reason: "must be an http or https URL",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validate an optional URL where blank input means "no URL".
pub fn optional_url(field: &'static str, value: Option<&str>) -> Result<Option<String>, ValidationError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => WebUrl::new(field, raw).map(|u| Some(u.into_string())),
    }
}

/// `#RRGGBB` colour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexColor(String);

impl HexColor {
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        if !HEX_COLOR_RE.is_match(s) {
            return Err(ValidationError::InvalidFormat {
                field: "brand color",
                reason: "must be a hex colour like #1A2B3C",
            });
        }
        Ok(Self(s.to_owned()))
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls() {
        assert!(WebUrl::new("logo", "https://cdn.example.com/logo.png").is_ok());
        assert!(WebUrl::new("logo", "http://localhost:3000").is_ok());
        assert!(WebUrl::new("logo", "ftp://example.com").is_err());
        assert!(WebUrl::new("logo", "https://").is_err());
        assert!(WebUrl::new("logo", "https://exa mple.com").is_err());
    }

    #[test]
    fn optional_urls() {
        assert_eq!(optional_url("website", Some("")).unwrap(), None);
        assert!(optional_url("website", Some("nope")).is_err());
    }

    #[test]
    fn colours() {
        assert!(HexColor::new("#1a2B3c").is_ok());
        assert!(HexColor::new("1a2b3c").is_err());
        assert!(HexColor::new("#1a2b3").is_err());
        assert!(HexColor::new("#gggggg").is_err());
    }
}
