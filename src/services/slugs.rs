//! Slug assignment at creation time
//!
//! Every slugged resource gets its slug here: either the client's explicit
//! slug, validated, or one derived from the title with `-2`, `-3`, ...
//! appended on collision.

use tracing::debug;

use crate::db::{SlugDocument, SlugRepository};
use crate::identifier::slug::{slugify, with_suffix, SLUG_MIN_LEN};
use crate::identifier::{is_valid_slug, HeuristicDetector, LegacyIdDetector, EXPECTED_FORMAT};
use crate::types::{Result, ServiceError};

/// Candidates tried before giving up, counting the bare slug
pub const MAX_SLUG_ATTEMPTS: u32 = 50;

/// Pick a free slug for a new resource
///
/// Slugs shaped like a UUID or native ID are refused (explicit) or suffixed
/// (derived), since strict resolution rejects those shapes before lookup.
pub async fn allocate_slug<T: SlugDocument>(
    repo: &SlugRepository<T>,
    title: &str,
    explicit: Option<&str>,
) -> Result<String> {
    let detector = HeuristicDetector::strict();
    let label = T::KIND.label();

    if let Some(slug) = explicit {
        if !is_valid_slug(slug) {
            return Err(ServiceError::InvalidSlug(format!(
                "'{}' is not a valid slug. Expected format: {}",
                slug, EXPECTED_FORMAT
            )));
        }
        if let Some(shape) = detector.detect(slug) {
            return Err(ServiceError::InvalidSlug(format!(
                "'{}' has the shape of a legacy identifier ({})",
                slug,
                shape.as_str()
            )));
        }
        if repo.slug_taken(slug).await? {
            return Err(ServiceError::conflict(
                "SLUG_CONFLICT",
                format!("{} slug '{}' is already taken", label, slug),
            ));
        }
        return Ok(slug.to_string());
    }

    let base = slugify(title);
    if base.len() < SLUG_MIN_LEN {
        return Err(ServiceError::InvalidInput(format!(
            "Title '{}' must contain at least {} letters or digits",
            title, SLUG_MIN_LEN
        )));
    }

    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = if attempt == 1 {
            base.clone()
        } else {
            with_suffix(&base, attempt)
        };

        if detector.is_legacy(&candidate) {
            continue;
        }
        if !repo.slug_taken(&candidate).await? {
            if attempt > 1 {
                debug!(kind = T::KIND.as_str(), base = %base, slug = %candidate, "Slug collision resolved");
            }
            return Ok(candidate);
        }
    }

    Err(ServiceError::conflict(
        "SLUG_CONFLICT",
        format!(
            "Could not find a free slug for '{}' after {} attempts",
            base, MAX_SLUG_ATTEMPTS
        ),
    ))
}
