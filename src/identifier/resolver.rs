//! Identifier resolution policy
//!
//! Maps a raw path identifier to either a repository lookup or a rejection.
//! Two deployed behaviours exist and are both expressed by [`ResolverPolicy`]:
//!
//! | Policy | Native ID | Legacy-shaped input | Malformed input |
//! |--------|-----------|---------------------|-----------------|
//! | legacy-compatible (`allow_legacy_fallback = true`) | tried first, then slug | looked up | looked up (misses) |
//! | strict (`allow_legacy_fallback = false`) | never | 410 | 400 |
//!
//! Rejections and misses are returned as values. Only repository failures are
//! errors.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::legacy::{is_native_id, HeuristicDetector, LegacyIdDetector, LegacyShape};
use super::slug::is_valid_slug;
use crate::db::ResourceRepository;
use crate::types::Result;

/// Kinds of slug-addressed resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Course,
    LearningPath,
    Funnel,
    EmailSequence,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::LearningPath => "learning_path",
            Self::Funnel => "funnel",
            Self::EmailSequence => "email_sequence",
        }
    }

    /// Display label used in response messages
    pub fn label(self) -> &'static str {
        match self {
            Self::Course => "Course",
            Self::LearningPath => "Learning path",
            Self::Funnel => "Funnel",
            Self::EmailSequence => "Email sequence",
        }
    }

    /// Error code for a well-formed identifier that matched nothing
    pub fn not_found_code(self) -> &'static str {
        match self {
            Self::Course => "COURSE_NOT_FOUND",
            Self::LearningPath => "PATH_NOT_FOUND",
            Self::Funnel => "FUNNEL_NOT_FOUND",
            Self::EmailSequence => "SEQUENCE_NOT_FOUND",
        }
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverPolicy {
    /// Try native store IDs before slugs and never reject legacy identifiers
    pub allow_legacy_fallback: bool,
}

impl ResolverPolicy {
    /// Policy for endpoints that still accept native IDs
    pub const LEGACY_COMPATIBLE: Self = Self {
        allow_legacy_fallback: true,
    };

    /// Slug-only policy
    pub const STRICT: Self = Self {
        allow_legacy_fallback: false,
    };

    pub fn name(&self) -> &'static str {
        if self.allow_legacy_fallback {
            "legacy_compatible"
        } else {
            "strict"
        }
    }
}

/// Lookup strategy chosen by classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPlan {
    NativeIdThenSlug,
    SlugOnly,
}

/// Outcome of classifying an identifier, before any I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Lookup(LookupPlan),
    RejectLegacy(LegacyShape),
    RejectMalformed,
}

/// Why an identifier was refused without a lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Legacy(LegacyShape),
    Malformed,
}

/// Which addressing scheme produced the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchedBy {
    Slug,
    NativeId,
}

/// Final resolver outcome
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Found { resource: T, matched_by: MatchedBy },
    NotFound,
    Rejected(Rejection),
}

impl<T> Resolution<T> {
    /// The resource, if one was found
    pub fn into_found(self) -> Option<T> {
        match self {
            Self::Found { resource, .. } => Some(resource),
            _ => None,
        }
    }

    /// Map the found resource, keeping the outcome
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Resolution<U> {
        match self {
            Self::Found {
                resource,
                matched_by,
            } => Resolution::Found {
                resource: f(resource),
                matched_by,
            },
            Self::NotFound => Resolution::NotFound,
            Self::Rejected(r) => Resolution::Rejected(r),
        }
    }
}

/// Resolution counters, the signal for retiring legacy-compatible endpoints
#[derive(Debug, Default)]
pub struct ResolutionStats {
    slug_hits: AtomicU64,
    native_id_hits: AtomicU64,
    legacy_rejections: AtomicU64,
    malformed_rejections: AtomicU64,
    misses: AtomicU64,
}

/// Point-in-time copy of [`ResolutionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSnapshot {
    pub slug_hits: u64,
    pub native_id_hits: u64,
    pub legacy_rejections: u64,
    pub malformed_rejections: u64,
    pub misses: u64,
}

impl ResolutionStats {
    pub fn snapshot(&self) -> ResolutionSnapshot {
        ResolutionSnapshot {
            slug_hits: self.slug_hits.load(Ordering::Relaxed),
            native_id_hits: self.native_id_hits.load(Ordering::Relaxed),
            legacy_rejections: self.legacy_rejections.load(Ordering::Relaxed),
            malformed_rejections: self.malformed_rejections.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn record_hit(&self, matched_by: MatchedBy) {
        let counter = match matched_by {
            MatchedBy::Slug => &self.slug_hits,
            MatchedBy::NativeId => &self.native_id_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejection(&self, rejection: Rejection) {
        let counter = match rejection {
            Rejection::Legacy(_) => &self.legacy_rejections,
            Rejection::Malformed => &self.malformed_rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Shared identifier resolver, injected into every slug-addressed route
pub struct IdentifierResolver {
    policy: ResolverPolicy,
    detector: Arc<dyn LegacyIdDetector>,
    stats: Arc<ResolutionStats>,
}

impl IdentifierResolver {
    pub fn new(policy: ResolverPolicy, detector: Arc<dyn LegacyIdDetector>) -> Self {
        Self {
            policy,
            detector,
            stats: Arc::new(ResolutionStats::default()),
        }
    }

    /// Resolver using the default heuristic detector
    pub fn with_policy(policy: ResolverPolicy) -> Self {
        Self::new(policy, Arc::new(HeuristicDetector::default()))
    }

    pub fn policy(&self) -> ResolverPolicy {
        self.policy
    }

    pub fn stats(&self) -> &Arc<ResolutionStats> {
        &self.stats
    }

    /// Classify an identifier without touching storage
    ///
    /// Total over all inputs: every string maps to exactly one decision.
    pub fn classify(&self, identifier: &str) -> Decision {
        if self.policy.allow_legacy_fallback {
            return if is_native_id(identifier) {
                Decision::Lookup(LookupPlan::NativeIdThenSlug)
            } else {
                Decision::Lookup(LookupPlan::SlugOnly)
            };
        }

        let shape = self.detector.detect(identifier);

        // UUIDs and native IDs also satisfy the slug pattern.
        if let Some(shape) = shape.filter(|s| s.is_definitive()) {
            return Decision::RejectLegacy(shape);
        }

        if is_valid_slug(identifier) {
            return Decision::Lookup(LookupPlan::SlugOnly);
        }

        match shape {
            Some(shape) => Decision::RejectLegacy(shape),
            None => Decision::RejectMalformed,
        }
    }

    /// Classify and, when allowed, look the identifier up
    ///
    /// Performs at most two repository calls under the legacy-compatible
    /// policy and at most one under the strict policy.
    pub async fn resolve<R>(&self, repo: &R, identifier: &str) -> Result<Resolution<R::Resource>>
    where
        R: ResourceRepository + ?Sized,
    {
        let kind = repo.kind();

        let plan = match self.classify(identifier) {
            Decision::Lookup(plan) => plan,
            Decision::RejectLegacy(shape) => {
                warn!(
                    kind = kind.as_str(),
                    policy = self.policy.name(),
                    identifier = %identifier,
                    shape = shape.as_str(),
                    "Rejected legacy identifier"
                );
                return Ok(self.reject(Rejection::Legacy(shape)));
            }
            Decision::RejectMalformed => {
                warn!(
                    kind = kind.as_str(),
                    policy = self.policy.name(),
                    identifier = %identifier,
                    "Rejected malformed identifier"
                );
                return Ok(self.reject(Rejection::Malformed));
            }
        };

        if plan == LookupPlan::NativeIdThenSlug {
            if let Some(resource) = repo.find_by_id(identifier).await? {
                info!(
                    kind = kind.as_str(),
                    policy = self.policy.name(),
                    identifier = %identifier,
                    "Resolved by native ID fallback"
                );
                return Ok(self.found(resource, MatchedBy::NativeId));
            }
        }

        match repo.find_by_slug(identifier).await? {
            Some(resource) => {
                debug!(kind = kind.as_str(), slug = %identifier, "Resolved by slug");
                Ok(self.found(resource, MatchedBy::Slug))
            }
            None => {
                debug!(
                    kind = kind.as_str(),
                    policy = self.policy.name(),
                    identifier = %identifier,
                    "Identifier matched nothing"
                );
                self.stats.record_miss();
                Ok(Resolution::NotFound)
            }
        }
    }

    fn found<T>(&self, resource: T, matched_by: MatchedBy) -> Resolution<T> {
        self.stats.record_hit(matched_by);
        Resolution::Found {
            resource,
            matched_by,
        }
    }

    fn reject<T>(&self, rejection: Rejection) -> Resolution<T> {
        self.stats.record_rejection(rejection);
        Resolution::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    const NATIVE_ID: &str = "507f1f77bcf86cd799439011";
    const UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    /// Repository double keyed by id and slug, counting calls
    #[derive(Default)]
    struct FakeRepo {
        by_id: HashMap<String, &'static str>,
        by_slug: HashMap<String, &'static str>,
        calls: AtomicUsize,
    }

    impl FakeRepo {
        fn with_course(id: &str, slug: &str, title: &'static str) -> Self {
            let mut repo = Self::default();
            repo.by_id.insert(id.to_string(), title);
            repo.by_slug.insert(slug.to_string(), title);
            repo
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ResourceRepository for FakeRepo {
        type Resource = &'static str;

        fn kind(&self) -> ResourceKind {
            ResourceKind::Course
        }

        async fn find_by_id(&self, id: &str) -> Result<Option<&'static str>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.by_id.get(id).copied())
        }

        async fn find_by_slug(&self, slug: &str) -> Result<Option<&'static str>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.by_slug.get(slug).copied())
        }
    }

    fn strict() -> IdentifierResolver {
        IdentifierResolver::with_policy(ResolverPolicy::STRICT)
    }

    fn compatible() -> IdentifierResolver {
        IdentifierResolver::with_policy(ResolverPolicy::LEGACY_COMPATIBLE)
    }

    #[test]
    fn test_strict_classification_partition() {
        let resolver = strict();
        assert_eq!(
            resolver.classify("aws-fundamentals"),
            Decision::Lookup(LookupPlan::SlugOnly)
        );
        assert_eq!(
            resolver.classify(NATIVE_ID),
            Decision::RejectLegacy(LegacyShape::NativeId)
        );
        assert_eq!(resolver.classify(UUID), Decision::RejectLegacy(LegacyShape::Uuid));
        assert_eq!(
            resolver.classify("AbCdEfGh12345678XyZ"),
            Decision::RejectLegacy(LegacyShape::OpaqueToken)
        );
        assert_eq!(resolver.classify("AWS_Fundamentals!"), Decision::RejectMalformed);
        assert_eq!(resolver.classify("ab"), Decision::RejectMalformed);
        assert_eq!(resolver.classify(""), Decision::RejectMalformed);
    }

    #[test]
    fn test_strict_long_hyphen_free_slug_is_still_a_slug() {
        // valid slug, so the opaque-token heuristic never applies
        assert_eq!(
            strict().classify("introductiontokubernetes"),
            Decision::Lookup(LookupPlan::SlugOnly)
        );
    }

    #[test]
    fn test_compatible_classification_never_rejects() {
        let resolver = compatible();
        assert_eq!(
            resolver.classify(NATIVE_ID),
            Decision::Lookup(LookupPlan::NativeIdThenSlug)
        );
        for input in [UUID, "AWS_Fundamentals!", "ab", "aws-fundamentals"] {
            assert_eq!(resolver.classify(input), Decision::Lookup(LookupPlan::SlugOnly));
        }
    }

    #[tokio::test]
    async fn test_strict_found_by_slug() {
        let repo = FakeRepo::with_course(NATIVE_ID, "aws-fundamentals", "AWS Fundamentals");
        let resolution = strict().resolve(&repo, "aws-fundamentals").await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Found {
                resource: "AWS Fundamentals",
                matched_by: MatchedBy::Slug
            }
        );
        assert_eq!(repo.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_miss() {
        let repo = FakeRepo::default();
        let resolution = strict().resolve(&repo, "aws-fundamentals").await.unwrap();
        assert_eq!(resolution, Resolution::NotFound);
        assert_eq!(repo.calls(), 1);
    }

    #[tokio::test]
    async fn test_strict_rejects_native_id_without_lookup() {
        let repo = FakeRepo::with_course(NATIVE_ID, "aws-fundamentals", "AWS Fundamentals");
        let resolver = strict();
        let resolution = resolver.resolve(&repo, NATIVE_ID).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Rejected(Rejection::Legacy(LegacyShape::NativeId))
        );
        assert_eq!(repo.calls(), 0);
        assert_eq!(resolver.stats().snapshot().legacy_rejections, 1);
    }

    #[tokio::test]
    async fn test_strict_rejects_malformed() {
        let repo = FakeRepo::default();
        let resolver = strict();
        let resolution = resolver.resolve(&repo, "AWS_Fundamentals!").await.unwrap();
        assert_eq!(resolution, Resolution::Rejected(Rejection::Malformed));
        assert_eq!(repo.calls(), 0);
        assert_eq!(resolver.stats().snapshot().malformed_rejections, 1);
    }

    #[tokio::test]
    async fn test_compatible_native_id_first() {
        let repo = FakeRepo::with_course(NATIVE_ID, "aws-fundamentals", "AWS Fundamentals");
        let resolver = compatible();
        let resolution = resolver.resolve(&repo, NATIVE_ID).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Found {
                resource: "AWS Fundamentals",
                matched_by: MatchedBy::NativeId
            }
        );
        assert_eq!(repo.calls(), 1);
        assert_eq!(resolver.stats().snapshot().native_id_hits, 1);
    }

    #[tokio::test]
    async fn test_compatible_falls_back_to_slug() {
        // a 24-hex string stored as a slug: id lookup misses, slug lookup hits
        let repo = FakeRepo::with_course("000000000000000000000000", NATIVE_ID, "Hex Slug");
        let resolution = compatible().resolve(&repo, NATIVE_ID).await.unwrap();
        assert_eq!(
            resolution,
            Resolution::Found {
                resource: "Hex Slug",
                matched_by: MatchedBy::Slug
            }
        );
        assert_eq!(repo.calls(), 2);
    }

    #[tokio::test]
    async fn test_compatible_miss_uses_at_most_two_lookups() {
        let repo = FakeRepo::default();
        let resolver = compatible();
        assert_eq!(
            resolver.resolve(&repo, NATIVE_ID).await.unwrap(),
            Resolution::NotFound
        );
        assert_eq!(repo.calls(), 2);
        assert_eq!(resolver.resolve(&repo, UUID).await.unwrap(), Resolution::NotFound);
        assert_eq!(repo.calls(), 3);
        assert_eq!(resolver.stats().snapshot().misses, 2);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let repo = FakeRepo::with_course(NATIVE_ID, "aws-fundamentals", "AWS Fundamentals");
        let resolver = strict();
        for input in ["aws-fundamentals", "missing-course", UUID, "ab"] {
            let first = resolver.resolve(&repo, input).await.unwrap();
            let second = resolver.resolve(&repo, input).await.unwrap();
            assert_eq!(first, second, "{input}");
        }
    }

    #[tokio::test]
    async fn test_custom_detector_is_honoured() {
        struct NeverLegacy;
        impl LegacyIdDetector for NeverLegacy {
            fn detect(&self, _candidate: &str) -> Option<LegacyShape> {
                None
            }
        }

        let resolver = IdentifierResolver::new(ResolverPolicy::STRICT, Arc::new(NeverLegacy));
        assert_eq!(resolver.classify(UUID), Decision::Lookup(LookupPlan::SlugOnly));
        assert_eq!(resolver.classify("AbCdEfGh12345678!"), Decision::RejectMalformed);
    }

    #[test]
    fn test_resolution_map() {
        let r: Resolution<u32> = Resolution::Found {
            resource: 2,
            matched_by: MatchedBy::Slug,
        };
        assert_eq!(r.map(|n| n * 2).into_found(), Some(4));
        let rejected: Resolution<u32> = Resolution::Rejected(Rejection::Malformed);
        assert_eq!(rejected.map(|n| n * 2).into_found(), None);
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(ResourceKind::Course.not_found_code(), "COURSE_NOT_FOUND");
        assert_eq!(ResourceKind::LearningPath.not_found_code(), "PATH_NOT_FOUND");
    }
}
