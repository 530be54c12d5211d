//! Bookmark document schema

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{unique_index, IntoIndexes, MutMetadata, StoredDocument};
use crate::db::schemas::Metadata;
use crate::identifier::ResourceKind;

/// Collection name for bookmarks
pub const BOOKMARK_COLLECTION: &str = "bookmarks";

/// What a bookmark points at
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkKind {
    #[default]
    Course,
    Path,
}

impl BookmarkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Path => "path",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "course" => Some(Self::Course),
            "path" => Some(Self::Path),
            _ => None,
        }
    }

    pub fn resource_kind(self) -> ResourceKind {
        match self {
            Self::Course => ResourceKind::Course,
            Self::Path => ResourceKind::LearningPath,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BookmarkDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub user_id: String,

    pub resource_kind: BookmarkKind,

    pub resource_slug: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl IntoIndexes for BookmarkDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![unique_index(
            doc! { "user_id": 1, "resource_kind": 1, "resource_slug": 1 },
            "user_resource_unique",
        )]
    }
}

impl MutMetadata for BookmarkDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

impl StoredDocument for BookmarkDoc {
    const COLLECTION: &'static str = BOOKMARK_COLLECTION;

    fn object_id(&self) -> Option<ObjectId> {
        self.id
    }

    fn set_object_id(&mut self, id: ObjectId) {
        self.id = Some(id);
    }
}
