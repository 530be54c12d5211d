//! Email sequence document schema
//!
//! A sequence is a timed series of emails a lead receives after enrolling.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::repository::SlugDocument;
use crate::db::schemas::Metadata;
use crate::identifier::ResourceKind;

/// Collection name for email sequences
pub const SEQUENCE_COLLECTION: &str = "email_sequences";

/// Sequence lifecycle
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStatus {
    #[default]
    Draft,
    Active,
    Paused,
}

impl SequenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            _ => None,
        }
    }
}

/// One email in a sequence
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SequenceStep {
    pub subject: String,

    pub body_template: String,

    /// Delay after the previous step (or enrollment, for the first step)
    #[serde(default)]
    pub delay_hours: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EmailSequenceDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    pub slug: String,

    /// Funnel whose leads this sequence nurtures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funnel_slug: Option<String>,

    #[serde(default)]
    pub steps: Vec<SequenceStep>,

    #[serde(default)]
    pub status: SequenceStatus,
}

impl IntoIndexes for EmailSequenceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index(doc! { "slug": 1 }, "slug_unique"),
            (
                doc! { "funnel_slug": 1 },
                Some(
                    IndexOptions::builder()
                        .name("funnel_slug_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for EmailSequenceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for EmailSequenceDoc {
    const COLLECTION: &'static str = SEQUENCE_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

impl SlugDocument for EmailSequenceDoc {
    const KIND: ResourceKind = ResourceKind::EmailSequence;

    fn slug(&self) -> &str {
        &self.slug
    }
}
