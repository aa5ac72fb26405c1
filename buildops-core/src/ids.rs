//! Opaque token and slug helpers

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;

static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s-]").expect("invalid non-word regex"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s_-]+").expect("invalid separator regex"));

/// Random alphanumeric token of `len` characters.
///
/// Used for session ids, MFA login tokens, invitation and reset tokens.
pub fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Turn free text into a URL slug: lowercase words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lower, "");
    let joined = SEPARATOR_RE.replace_all(&stripped, "-");
    joined.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn token_has_requested_length() {
        assert_eq!(generate_token(32).len(), 32);
        assert!(generate_token(8).chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_differ() {
        assert_ne!(generate_token(32), generate_token(32));
    }

    #[test]
    fn slugify_company_names() {
        assert_eq!(slugify("Acme Builders, LLC"), "acme-builders-llc");
        assert_eq!(slugify("  Rio Grande  Valley Homes "), "rio-grande-valley-homes");
        assert_eq!(slugify("--top_notch--"), "top-notch");
    }

    proptest! {
        #[test]
        fn slug_has_no_edge_or_double_hyphens(s in "[A-Za-z0-9 _-]{0,40}") {
            let slug = slugify(&s);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
            prop_assert_eq!(slug.clone(), slug.to_lowercase());
        }
    }
}
