//! Marketing funnel document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::repository::SlugDocument;
use crate::db::schemas::Metadata;
use crate::identifier::ResourceKind;

/// Collection name for funnels
pub const FUNNEL_COLLECTION: &str = "funnels";

/// Funnel with ordered stages; leads enter at the first stage
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FunnelDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub name: String,

    pub slug: String,

    #[serde(default)]
    pub description: String,

    pub stages: Vec<String>,

    #[serde(default)]
    pub active: bool,
}

impl FunnelDoc {
    pub fn entry_stage(&self) -> Option<&str> {
        self.stages.first().map(String::as_str)
    }

    pub fn has_stage(&self, stage: &str) -> bool {
        self.stages.iter().any(|s| s == stage)
    }
}

impl IntoIndexes for FunnelDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index(doc! { "slug": 1 }, "slug_unique")]
    }
}

impl MutMetadata for FunnelDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for FunnelDoc {
    const COLLECTION: &'static str = FUNNEL_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

impl SlugDocument for FunnelDoc {
    const KIND: ResourceKind = ResourceKind::Funnel;

    fn slug(&self) -> &str {
        &self.slug
    }
}
