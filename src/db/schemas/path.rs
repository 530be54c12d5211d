//! Learning path document schema
//!
//! A path is an ordered list of course slugs.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::repository::SlugDocument;
use crate::db::schemas::{CourseLevel, Metadata};
use crate::identifier::ResourceKind;

/// Collection name for learning paths
pub const PATH_COLLECTION: &str = "learning_paths";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LearningPathDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    pub slug: String,

    #[serde(default)]
    pub description: String,

    /// Course slugs in study order
    #[serde(default)]
    pub course_slugs: Vec<String>,

    #[serde(default)]
    pub difficulty: CourseLevel,

    #[serde(default)]
    pub estimated_hours: u32,

    #[serde(default)]
    pub published: bool,
}

impl IntoIndexes for LearningPathDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index(doc! { "slug": 1 }, "slug_unique"),
            // Paths containing a given course
            (
                doc! { "course_slugs": 1 },
                Some(
                    IndexOptions::builder()
                        .name("course_slugs_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for LearningPathDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for LearningPathDoc {
    const COLLECTION: &'static str = PATH_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

impl SlugDocument for LearningPathDoc {
    const KIND: ResourceKind = ResourceKind::LearningPath;

    fn slug(&self) -> &str {
        &self.slug
    }
}
