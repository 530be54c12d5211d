//! Document persistence
//!
//! Services talk to [`DocumentCollection`] trait objects. Two backends exist:
//! MongoDB ([`mongo::MongoCollection`]) and an in-memory store
//! ([`memory::MemoryCollection`]) that applies the same filters.

pub mod memory;
pub mod mongo;
pub mod repository;
pub mod schemas;

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, Document};
use std::sync::Arc;

use crate::types::Result;

pub use memory::MemoryCollection;
pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata, StoredDocument};
pub use repository::{ResourceRepository, SlugDocument, SlugRepository};

use schemas::{
    BookmarkDoc, CertificateDoc, CourseDoc, EmailSequenceDoc, FunnelDoc, LeadDoc, LearningPathDoc,
};

/// Equality filter over top-level or dotted fields
///
/// A condition on an array field matches when the array contains the value,
/// as it does in MongoDB.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    conditions: Vec<(String, Bson)>,
}

impl FieldFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Add an equality condition when the value is present
    pub fn eq_opt<V: Into<Bson>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(field, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// MongoDB query document
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        for (field, value) in &self.conditions {
            doc.insert(field.clone(), value.clone());
        }
        doc
    }

    /// Evaluate the filter against a stored document
    pub fn matches(&self, doc: &Document) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| match lookup_path(doc, field) {
                Some(actual @ Bson::Array(items)) => items.contains(expected) || actual == expected,
                Some(actual) => actual == expected,
                None => matches!(expected, Bson::Null),
            })
    }
}

fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Pagination for list queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// Storage operations every collection supports
///
/// All reads exclude soft-deleted documents.
#[async_trait]
pub trait DocumentCollection<T>: Send + Sync {
    /// Insert a new document, stamping metadata. Returns the assigned ID.
    async fn insert(&self, item: T) -> Result<ObjectId>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<T>>;

    /// First live document matching the filter, in insertion order
    async fn find_one(&self, filter: &FieldFilter) -> Result<Option<T>>;

    async fn find_many(&self, filter: &FieldFilter, page: Page) -> Result<Vec<T>>;

    /// Replace a live document. Returns false if nothing matched.
    async fn replace(&self, id: &ObjectId, item: T) -> Result<bool>;

    /// Mark a live document deleted. Returns false if nothing matched.
    async fn soft_delete(&self, id: &ObjectId) -> Result<bool>;
}

/// Shared handle to a collection of `T`
pub type SharedCollection<T> = Arc<dyn DocumentCollection<T>>;

/// Every collection the services use
#[derive(Clone)]
pub struct Collections {
    pub courses: SharedCollection<CourseDoc>,
    pub paths: SharedCollection<LearningPathDoc>,
    pub certificates: SharedCollection<CertificateDoc>,
    pub bookmarks: SharedCollection<BookmarkDoc>,
    pub funnels: SharedCollection<FunnelDoc>,
    pub sequences: SharedCollection<EmailSequenceDoc>,
    pub leads: SharedCollection<LeadDoc>,
    backend: &'static str,
}

impl Collections {
    /// MongoDB-backed collections, creating indexes on each
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        Ok(Self {
            courses: Arc::new(client.collection::<CourseDoc>().await?),
            paths: Arc::new(client.collection::<LearningPathDoc>().await?),
            certificates: Arc::new(client.collection::<CertificateDoc>().await?),
            bookmarks: Arc::new(client.collection::<BookmarkDoc>().await?),
            funnels: Arc::new(client.collection::<FunnelDoc>().await?),
            sequences: Arc::new(client.collection::<EmailSequenceDoc>().await?),
            leads: Arc::new(client.collection::<LeadDoc>().await?),
            backend: "mongodb",
        })
    }

    /// Process-local collections
    pub fn memory() -> Self {
        Self {
            courses: Arc::new(MemoryCollection::<CourseDoc>::new()),
            paths: Arc::new(MemoryCollection::<LearningPathDoc>::new()),
            certificates: Arc::new(MemoryCollection::<CertificateDoc>::new()),
            bookmarks: Arc::new(MemoryCollection::<BookmarkDoc>::new()),
            funnels: Arc::new(MemoryCollection::<FunnelDoc>::new()),
            sequences: Arc::new(MemoryCollection::<EmailSequenceDoc>::new()),
            leads: Arc::new(MemoryCollection::<LeadDoc>::new()),
            backend: "memory",
        }
    }

    /// Backend name reported by `/status`
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_filter_document() {
        let filter = FieldFilter::new()
            .eq("category", "cloud")
            .eq_opt("level", None::<&str>)
            .eq_opt("published", Some(true));
        assert_eq!(
            filter.to_document(),
            doc! { "category": "cloud", "published": true }
        );
    }

    #[test]
    fn test_filter_matches_scalars_and_arrays() {
        let stored = doc! {
            "slug": "aws-fundamentals",
            "tags": ["cloud", "aws"],
            "metadata": { "is_deleted": false },
        };

        assert!(FieldFilter::new().matches(&stored));
        assert!(FieldFilter::new().eq("slug", "aws-fundamentals").matches(&stored));
        assert!(FieldFilter::new().eq("tags", "aws").matches(&stored));
        assert!(FieldFilter::new().eq("metadata.is_deleted", false).matches(&stored));
        assert!(!FieldFilter::new().eq("tags", "gcp").matches(&stored));
        assert!(!FieldFilter::new().eq("slug", "other").matches(&stored));
        assert!(!FieldFilter::new().eq("missing", "x").matches(&stored));
    }
}
