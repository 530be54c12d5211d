//! Slug validation and generation
//!
//! A slug is the only public identifier newer endpoints accept: lowercase
//! alphanumeric runs separated by single hyphens, 3 to 100 characters.

use regex::Regex;
use std::sync::LazyLock;

/// Minimum slug length (inclusive)
pub const SLUG_MIN_LEN: usize = 3;

/// Maximum slug length (inclusive)
pub const SLUG_MAX_LEN: usize = 100;

/// Human-readable format description returned with 400 responses
pub const EXPECTED_FORMAT: &str =
    "3-100 characters: lowercase letters and digits separated by single hyphens (e.g. aws-fundamentals)";

static SLUG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("static slug pattern"));

/// Check whether a candidate is a well-formed slug
pub fn is_valid_slug(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(SLUG_MIN_LEN..=SLUG_MAX_LEN).contains(&len) {
        return false;
    }

    if !SLUG_PATTERN.is_match(candidate) {
        return false;
    }

    // Redundant with the pattern; kept as its own check.
    candidate == candidate.to_lowercase()
}

/// Derive a slug from a title
///
/// Lowercases ASCII alphanumerics and collapses every run of other
/// characters into a single hyphen. The result may still be shorter than
/// [`SLUG_MIN_LEN`]; callers validate it.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_hyphen = false;

    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    if slug.len() > SLUG_MAX_LEN {
        slug.truncate(SLUG_MAX_LEN);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    slug
}

/// Append a numeric suffix for collision handling (`intro-to-rust-2`)
///
/// Trims the base so the suffixed slug stays within [`SLUG_MAX_LEN`].
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{}", n);
    let keep = SLUG_MAX_LEN.saturating_sub(suffix.len()).min(base.len());
    let trimmed = base[..keep].trim_end_matches('-');
    format!("{}{}", trimmed, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_slugs() {
        assert!(is_valid_slug("aws-fundamentals"));
        assert!(is_valid_slug("abc"));
        assert!(is_valid_slug("a1-b2-c3"));
        assert!(is_valid_slug(&"a".repeat(100)));
    }

    #[test]
    fn test_length_bounds() {
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("ab"));
        assert!(!is_valid_slug(&"a".repeat(101)));
    }

    #[test]
    fn test_rejects_bad_hyphens_and_case() {
        assert!(!is_valid_slug("-aws"));
        assert!(!is_valid_slug("aws-"));
        assert!(!is_valid_slug("aws--fundamentals"));
        assert!(!is_valid_slug("Aws-fundamentals"));
        assert!(!is_valid_slug("AWS_Fundamentals!"));
        assert!(!is_valid_slug("aws fundamentals"));
        assert!(!is_valid_slug("aws_fundamentals"));
    }

    #[test]
    fn test_uppercase_anywhere_is_invalid() {
        for s in ["Abc", "aBc", "abC", "abc-Def", "ABC"] {
            assert!(!is_valid_slug(s), "{s} should be invalid");
        }
    }

    #[test]
    fn test_non_ascii_is_invalid() {
        assert!(!is_valid_slug("café-basics"));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("AWS Fundamentals"), "aws-fundamentals");
        assert_eq!(slugify("  Intro to Rust: Part 2!  "), "intro-to-rust-part-2");
        assert_eq!(slugify("C++ & You"), "c-you");
        assert_eq!(slugify("Café Basics"), "caf-basics");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_slugify_output_is_valid_when_long_enough() {
        for title in ["Kubernetes in Action", "SQL 101", "  --Data--Science--  "] {
            let slug = slugify(title);
            assert!(is_valid_slug(&slug), "{slug} from {title}");
        }
    }

    #[test]
    fn test_slugify_truncates() {
        let title = "word ".repeat(40);
        let slug = slugify(&title);
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('-'));
        assert!(is_valid_slug(&slug));
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("intro-to-rust", 2), "intro-to-rust-2");

        let long = "a".repeat(100);
        let suffixed = with_suffix(&long, 12);
        assert_eq!(suffixed.len(), 100);
        assert!(suffixed.ends_with("-12"));
        assert!(is_valid_slug(&suffixed));
    }
}
