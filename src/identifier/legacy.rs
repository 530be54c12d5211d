//! Legacy identifier detection
//!
//! Recognises identifiers from the pre-slug addressing scheme so clients get
//! migration guidance (410) instead of a generic format error (400). This is
//! best-effort diagnostics: it never decides whether a lookup succeeds.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("static uuid pattern")
});

static NATIVE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[0-9a-f]{24}$").expect("static object id pattern"));

/// Hyphen-free alphanumeric strings longer than this look like old mock-data tokens
const OPAQUE_TOKEN_MIN_LEN: usize = 16;

/// Which legacy scheme an identifier resembles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyShape {
    /// RFC 4122 UUID, versions 1-5
    Uuid,
    /// 24 hex characters (document store ObjectId)
    NativeId,
    /// Long hyphen-free alphanumeric token
    OpaqueToken,
}

impl LegacyShape {
    /// Shapes that are unambiguous enough to reject even when the string also
    /// satisfies the slug pattern
    pub fn is_definitive(self) -> bool {
        matches!(self, Self::Uuid | Self::NativeId)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::NativeId => "native_id",
            Self::OpaqueToken => "opaque_token",
        }
    }
}

/// Strategy for recognising legacy identifiers
pub trait LegacyIdDetector: Send + Sync {
    /// Return the legacy shape the candidate matches, if any
    fn detect(&self, candidate: &str) -> Option<LegacyShape>;

    fn is_legacy(&self, candidate: &str) -> bool {
        self.detect(candidate).is_some()
    }
}

/// Default detector: UUID, native ID, and the long-token heuristic
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicDetector {
    /// Disable the long-token catch-all, keeping only UUID and native ID
    pub strict_only: bool,
}

impl HeuristicDetector {
    /// Detector without the opaque-token heuristic
    pub fn strict() -> Self {
        Self { strict_only: true }
    }
}

impl LegacyIdDetector for HeuristicDetector {
    fn detect(&self, candidate: &str) -> Option<LegacyShape> {
        if UUID_PATTERN.is_match(candidate) {
            return Some(LegacyShape::Uuid);
        }
        if NATIVE_ID_PATTERN.is_match(candidate) {
            return Some(LegacyShape::NativeId);
        }
        if !self.strict_only && is_opaque_token(candidate) {
            return Some(LegacyShape::OpaqueToken);
        }
        None
    }
}

/// Check whether a string has the document store's native ID shape
pub fn is_native_id(candidate: &str) -> bool {
    NATIVE_ID_PATTERN.is_match(candidate)
}

/// Check whether a candidate looks like any legacy identifier
pub fn is_legacy_id(candidate: &str) -> bool {
    HeuristicDetector::default().is_legacy(candidate)
}

fn is_opaque_token(candidate: &str) -> bool {
    candidate.len() >= OPAQUE_TOKEN_MIN_LEN && candidate.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_versions() {
        assert!(is_legacy_id("550e8400-e29b-41d4-a716-446655440000"));
        assert!(is_legacy_id("6ba7b810-9dad-11d1-80b4-00c04fd430c8"));
        assert!(is_legacy_id("550E8400-E29B-41D4-A716-446655440000"));

        // version nibble 0 and 6 are outside 1-5
        assert!(!is_legacy_id("550e8400-e29b-01d4-a716-446655440000"));
        assert!(!is_legacy_id("550e8400-e29b-61d4-a716-446655440000"));
        // variant nibble must be 8, 9, a or b
        assert!(!is_legacy_id("550e8400-e29b-41d4-c716-446655440000"));
    }

    #[test]
    fn test_native_id() {
        assert_eq!(
            HeuristicDetector::default().detect("507f1f77bcf86cd799439011"),
            Some(LegacyShape::NativeId)
        );
        assert!(is_legacy_id("507F1F77BCF86CD799439011"));
        assert!(is_native_id("507f1f77bcf86cd799439011"));
        assert!(!is_native_id("507f1f77bcf86cd79943901"));
        assert!(!is_native_id("507f1f77bcf86cd79943901z"));
    }

    #[test]
    fn test_opaque_token_threshold() {
        // 16 characters, no hyphens
        assert_eq!(
            HeuristicDetector::default().detect("AbCdEfGh12345678"),
            Some(LegacyShape::OpaqueToken)
        );
        // 15 characters is not long enough
        assert!(!is_legacy_id("AbCdEfGh1234567"));
        // hyphens disqualify the heuristic
        assert!(!is_legacy_id("abcdefgh-12345678"));
        // punctuation disqualifies the heuristic
        assert!(!is_legacy_id("AbCdEfGh12345678!"));
    }

    #[test]
    fn test_not_legacy() {
        assert!(!is_legacy_id("aws-fundamentals"));
        assert!(!is_legacy_id("AWS_Fundamentals!"));
        assert!(!is_legacy_id("ab"));
        assert!(!is_legacy_id(""));
    }

    #[test]
    fn test_strict_detector_skips_heuristic() {
        let detector = HeuristicDetector::strict();
        assert_eq!(detector.detect("AbCdEfGh12345678"), None);
        assert_eq!(
            detector.detect("550e8400-e29b-41d4-a716-446655440000"),
            Some(LegacyShape::Uuid)
        );
    }

    #[test]
    fn test_definitive_shapes() {
        assert!(LegacyShape::Uuid.is_definitive());
        assert!(LegacyShape::NativeId.is_definitive());
        assert!(!LegacyShape::OpaqueToken.is_definitive());
    }
}
