//! Lead document schema

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::schemas::Metadata;

/// Collection name for leads
pub const LEAD_COLLECTION: &str = "leads";

/// Prospect captured by a funnel
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LeadDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Lowercased email address
    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Where the lead came from (landing page, campaign, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub funnel_slug: String,

    /// Current funnel stage
    pub stage: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence_slug: Option<String>,

    pub captured_at: DateTime,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrolled_at: Option<DateTime>,
}

impl LeadDoc {
    pub fn new(email: String, funnel_slug: String, stage: String) -> Self {
        Self {
            id: None,
            metadata: Metadata::new(),
            email,
            name: None,
            source: None,
            funnel_slug,
            stage,
            sequence_slug: None,
            captured_at: DateTime::now(),
            enrolled_at: None,
        }
    }
}

impl IntoIndexes for LeadDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index(doc! { "email": 1, "funnel_slug": 1 }, "email_funnel_unique"),
            (
                doc! { "funnel_slug": 1, "stage": 1 },
                Some(
                    IndexOptions::builder()
                        .name("funnel_stage_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LeadDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for LeadDoc {
    const COLLECTION: &'static str = LEAD_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}
