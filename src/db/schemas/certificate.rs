//! Certificate document schema
//!
//! Certificates are addressed by their verification code, not by slug.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::schemas::Metadata;

/// Collection name for certificates
pub const CERTIFICATE_COLLECTION: &str = "certificates";

pub const VERIFICATION_CODE_INDEX: &str = "verification_code_unique";

/// One live certificate per user and course
pub const USER_COURSE_INDEX: &str = "user_course_unique";

/// Certificate of completion stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificateDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    /// Slug of the completed course
    pub course_slug: String,

    /// Course title at time of issue
    pub course_title: String,

    /// Public code printed on the certificate
    pub verification_code: String,

    pub issued_at: DateTime,

    #[serde(default)]
    pub revoked: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime>,
}

impl CertificateDoc {
    pub fn new(user_id: String, course_slug: String, course_title: String, code: String) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            user_id,
            course_slug,
            course_title,
            verification_code: code,
            issued_at: DateTime::now(),
            revoked: false,
            revoked_at: None,
        }
    }
}

impl IntoIndexes for CertificateDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index(doc! { "verification_code": 1 }, VERIFICATION_CODE_INDEX),
            unique_index(doc! { "user_id": 1, "course_slug": 1 }, USER_COURSE_INDEX),
        ]
    }
}

impl MutMetadata for CertificateDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for CertificateDoc {
    const COLLECTION: &'static str = CERTIFICATE_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}
