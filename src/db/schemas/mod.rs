//! Database schemas for the academy services
//!
//! Each document type declares its collection name and indexes. Slugged
//! documents carry a unique, partial `slug` index so a deleted resource
//! releases its slug.

mod bookmark;
mod certificate;
mod course;
mod email_sequence;
mod funnel;
mod lead;
mod metadata;
mod path;

pub use bookmark::{BookmarkDoc, BookmarkKind, BOOKMARK_COLLECTION};
pub use certificate::{
    CertificateDoc, CERTIFICATE_COLLECTION, USER_COURSE_INDEX, VERIFICATION_CODE_INDEX,
};
pub use course::{CourseDoc, CourseLevel, COURSE_COLLECTION};
pub use email_sequence::{EmailSequenceDoc, SequenceStatus, SequenceStep, SEQUENCE_COLLECTION};
pub use funnel::{FunnelDoc, FUNNEL_COLLECTION};
pub use lead::{LeadDoc, LEAD_COLLECTION};
pub use metadata::Metadata;
pub use path::{LearningPathDoc, PATH_COLLECTION};
