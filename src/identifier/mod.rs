//! Public identifier handling
//!
//! Slugs are the public identifier for courses, learning paths, funnels and
//! email sequences. Older endpoints also accept native store IDs; newer ones
//! reject them with migration guidance.
//!
//! ```text
//! raw path segment
//!     ↓
//! IdentifierResolver::classify   (slug validator + legacy detector, pure)
//!     ↓
//! IdentifierResolver::resolve    (ResourceRepository: find_by_id / find_by_slug)
//!     ↓
//! Resolution::{Found, NotFound, Rejected}
//! ```

pub mod legacy;
pub mod resolver;
pub mod slug;

pub use legacy::{is_legacy_id, is_native_id, HeuristicDetector, LegacyIdDetector, LegacyShape};
pub use resolver::{
    Decision, IdentifierResolver, LookupPlan, MatchedBy, Rejection, Resolution, ResolutionSnapshot,
    ResolutionStats, ResolverPolicy, ResourceKind,
};
pub use slug::{is_valid_slug, slugify, EXPECTED_FORMAT};
