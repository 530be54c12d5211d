//! Course document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::repository::SlugDocument;
use crate::db::schemas::Metadata;
use crate::identifier::ResourceKind;

/// Collection name for courses
pub const COURSE_COLLECTION: &str = "courses";

/// Course difficulty
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "beginner" => Some(Self::Beginner),
            "intermediate" => Some(Self::Intermediate),
            "advanced" => Some(Self::Advanced),
            _ => None,
        }
    }
}

/// Course document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CourseDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub title: String,

    /// Public identifier, assigned once at creation
    pub slug: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub instructor: String,

    #[serde(default)]
    pub category: String,

    #[serde(default)]
    pub level: CourseLevel,

    /// Price in the smallest currency unit
    #[serde(default)]
    pub price_cents: i64,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub published: bool,
}

impl IntoIndexes for CourseDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            unique_index(doc! { "slug": 1 }, "slug_unique"),
            (
                doc! { "category": 1 },
                Some(
                    IndexOptions::builder()
                        .name("category_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "tags": 1 },
                Some(IndexOptions::builder().name("tags_index".to_string()).build()),
            ),
        ]
    }
}

impl MutMetadata for CourseDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for CourseDoc {
    const COLLECTION: &'static str = COURSE_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}

impl SlugDocument for CourseDoc {
    const KIND: ResourceKind = ResourceKind::Course;

    fn slug(&self) -> &str {
        &self.slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_serialization() {
        let course = CourseDoc {
            title: "AWS Fundamentals".into(),
            slug: "aws-fundamentals".into(),
            level: CourseLevel::Advanced,
            ..Default::default()
        };
        let doc = bson::to_document(&course).unwrap();
        assert_eq!(doc.get_str("level").unwrap(), "advanced");
        assert!(!doc.contains_key("_id"));
        assert_eq!(CourseLevel::parse("intermediate"), Some(CourseLevel::Intermediate));
        assert_eq!(CourseLevel::parse("expert"), None);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let doc = doc! { "title": "Intro", "slug": "intro" };
        let course: CourseDoc = bson::from_document(doc).unwrap();
        assert_eq!(course.level, CourseLevel::Beginner);
        assert!(course.tags.is_empty());
        assert!(!course.metadata.is_deleted);
    }
}
