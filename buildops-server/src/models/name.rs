//! Human-entered names and titles

use super::validation::bounded_text;
use super::ValidationError;

const MIN_NAME_LEN: usize = 2;
const MAX_NAME_LEN: usize = 200;

/// Trimmed name of 2..=200 characters (people, companies, projects, tasks)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(field: &'static str, s: &str) -> Result<Self, ValidationError> {
        bounded_text(field, s, MIN_NAME_LEN, MAX_NAME_LEN).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a name that may be omitted from a partial update.
pub fn optional_name(field: &'static str, value: Option<&str>) -> Result<Option<String>, ValidationError> {
    value
        .map(|v| DisplayName::new(field, v).map(DisplayName::into_string))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_bounds() {
        assert_eq!(DisplayName::new("name", "  Bo ").unwrap().as_str(), "Bo");
        assert!(DisplayName::new("name", "B").is_err());
        assert!(DisplayName::new("name", &"x".repeat(201)).is_err());
    }

    #[test]
    fn optional_passthrough() {
        assert_eq!(optional_name("name", None).unwrap(), None);
        assert!(optional_name("name", Some("x")).is_err());
    }
}
