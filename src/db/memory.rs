//! In-memory document collections
//!
//! Stores documents as BSON so filters behave like the MongoDB backend.
//! Unique indexes declared by the schema are enforced over live documents.
//! Used in dev mode when MongoDB is unreachable, and by tests.

use async_trait::async_trait;
use bson::{oid::ObjectId, Bson, DateTime, Document};
use dashmap::DashMap;
use std::marker::PhantomData;
use tokio::sync::Mutex;
use tracing::debug;

use crate::db::mongo::StoredDocument;
use crate::db::{DocumentCollection, FieldFilter, Page};
use crate::types::{Result, ServiceError};

/// In-memory collection keyed by ObjectId
pub struct MemoryCollection<T> {
    docs: DashMap<ObjectId, Document>,
    /// Held across the unique-index check and the write that follows it
    writes: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: StoredDocument> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            writes: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Number of documents including soft-deleted ones
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    fn is_live(doc: &Document) -> bool {
        !matches!(
            doc.get_document("metadata").ok().and_then(|m| m.get("is_deleted")),
            Some(Bson::Boolean(true))
        )
    }

    /// Live documents matching the filter, in insertion order
    fn matching(&self, filter: &FieldFilter) -> Vec<Document> {
        let mut hits: Vec<(ObjectId, Document)> = self
            .docs
            .iter()
            .filter(|entry| Self::is_live(entry.value()) && filter.matches(entry.value()))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        // ObjectIds grow monotonically within a process
        hits.sort_by_key(|(id, _)| *id);
        hits.into_iter().map(|(_, doc)| doc).collect()
    }

    /// Reject the candidate if it collides with a live document on a unique index
    fn check_unique(&self, candidate: &Document, own_id: &ObjectId) -> Result<()> {
        for (keys, options) in T::into_indices() {
            let Some(options) = options.filter(|o| o.unique.unwrap_or(false)) else {
                continue;
            };

            let fields: Vec<&String> = keys.keys().collect();
            let collides = self.docs.iter().any(|entry| {
                entry.key() != own_id
                    && Self::is_live(entry.value())
                    && fields
                        .iter()
                        .all(|f| entry.value().get(f.as_str()) == candidate.get(f.as_str()))
            });

            if collides {
                let index = options
                    .name
                    .unwrap_or_else(|| fields.iter().map(|f| f.as_str()).collect::<Vec<_>>().join("_"));
                return Err(ServiceError::duplicate_key(index));
            }
        }
        Ok(())
    }
}

impl<T: StoredDocument> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: StoredDocument> DocumentCollection<T> for MemoryCollection<T> {
    async fn insert(&self, mut item: T) -> Result<ObjectId> {
        let now = DateTime::now();
        let metadata = item.mut_metadata();
        metadata.is_deleted = false;
        metadata.deleted_at = None;
        metadata.created_at = Some(now);
        metadata.updated_at = Some(now);

        let id = item.object_id().unwrap_or_default();
        item.set_object_id(id);

        let doc = bson::to_document(&item)?;
        let _guard = self.writes.lock().await;
        self.check_unique(&doc, &id)?;
        self.docs.insert(id, doc);

        debug!(collection = T::COLLECTION, id = %id, "Inserted document");
        Ok(id)
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<T>> {
        match self.docs.get(id) {
            Some(doc) if Self::is_live(doc.value()) => Ok(Some(bson::from_document(doc.clone())?)),
            _ => Ok(None),
        }
    }

    async fn find_one(&self, filter: &FieldFilter) -> Result<Option<T>> {
        match self.matching(filter).into_iter().next() {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn find_many(&self, filter: &FieldFilter, page: Page) -> Result<Vec<T>> {
        let skip = page.skip.unwrap_or(0) as usize;
        let limit = page
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);

        self.matching(filter)
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| bson::from_document(doc).map_err(ServiceError::from))
            .collect()
    }

    async fn replace(&self, id: &ObjectId, mut item: T) -> Result<bool> {
        let _guard = self.writes.lock().await;
        let live = matches!(self.docs.get(id), Some(doc) if Self::is_live(doc.value()));
        if !live {
            return Ok(false);
        }

        item.set_object_id(*id);
        item.mut_metadata().updated_at = Some(DateTime::now());

        let doc = bson::to_document(&item)?;
        self.check_unique(&doc, id)?;
        self.docs.insert(*id, doc);
        Ok(true)
    }

    async fn soft_delete(&self, id: &ObjectId) -> Result<bool> {
        let _guard = self.writes.lock().await;
        let Some(mut entry) = self.docs.get_mut(id) else {
            return Ok(false);
        };
        if !Self::is_live(entry.value()) {
            return Ok(false);
        }

        let now = DateTime::now();
        let mut metadata = entry
            .value()
            .get_document("metadata")
            .cloned()
            .unwrap_or_default();
        metadata.insert("is_deleted", true);
        metadata.insert("deleted_at", now);
        metadata.insert("updated_at", now);
        entry.value_mut().insert("metadata", metadata);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::CourseDoc;
    use std::sync::Arc;

    fn course(slug: &str, category: &str) -> CourseDoc {
        CourseDoc {
            title: slug.replace('-', " "),
            slug: slug.to_string(),
            category: category.to_string(),
            tags: vec!["cloud".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = MemoryCollection::<CourseDoc>::new();
        let id = store.insert(course("aws-fundamentals", "cloud")).await.unwrap();

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.slug, "aws-fundamentals");
        assert_eq!(found.id, Some(id));
        assert!(found.metadata.created_at.is_some());

        let by_slug = store
            .find_one(&FieldFilter::new().eq("slug", "aws-fundamentals"))
            .await
            .unwrap();
        assert!(by_slug.is_some());
    }

    #[tokio::test]
    async fn test_unique_slug_enforced_for_live_documents() {
        let store = MemoryCollection::<CourseDoc>::new();
        let id = store.insert(course("aws-fundamentals", "cloud")).await.unwrap();

        let err = store
            .insert(course("aws-fundamentals", "other"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "SLUG_CONFLICT");
        assert_eq!(err.conflict_index(), Some("slug_unique"));

        // slug becomes free once the holder is deleted
        assert!(store.soft_delete(&id).await.unwrap());
        store.insert(course("aws-fundamentals", "other")).await.unwrap();
    }

    #[tokio::test]
    async fn test_soft_delete_hides_document() {
        let store = MemoryCollection::<CourseDoc>::new();
        let id = store.insert(course("aws-fundamentals", "cloud")).await.unwrap();

        assert!(store.soft_delete(&id).await.unwrap());
        assert!(!store.soft_delete(&id).await.unwrap());
        assert!(store.find_by_id(&id).await.unwrap().is_none());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_find_many_filters_and_pages_in_order() {
        let store = MemoryCollection::<CourseDoc>::new();
        for (slug, category) in [
            ("course-one", "cloud"),
            ("course-two", "data"),
            ("course-three", "cloud"),
            ("course-four", "cloud"),
        ] {
            store.insert(course(slug, category)).await.unwrap();
        }

        let cloud = store
            .find_many(&FieldFilter::new().eq("category", "cloud"), Page::default())
            .await
            .unwrap();
        let slugs: Vec<_> = cloud.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["course-one", "course-three", "course-four"]);

        let page = store
            .find_many(
                &FieldFilter::new().eq("category", "cloud"),
                Page {
                    skip: Some(1),
                    limit: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].slug, "course-three");

        // array fields match on element containment
        let tagged = store
            .find_many(&FieldFilter::new().eq("tags", "cloud"), Page::default())
            .await
            .unwrap();
        assert_eq!(tagged.len(), 4);
    }

    #[tokio::test]
    async fn test_replace_keeps_id() {
        let store = MemoryCollection::<CourseDoc>::new();
        let id = store.insert(course("aws-fundamentals", "cloud")).await.unwrap();

        let mut updated = store.find_by_id(&id).await.unwrap().unwrap();
        updated.title = "AWS Fundamentals".into();
        assert!(store.replace(&id, updated).await.unwrap());

        let found = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.title, "AWS Fundamentals");
        assert!(!store.replace(&ObjectId::new(), found).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_inserts_keep_slug_unique() {
        for _ in 0..50 {
            let store = Arc::new(MemoryCollection::<CourseDoc>::new());
            let tasks: Vec<_> = (0..8)
                .map(|i| {
                    let store = Arc::clone(&store);
                    tokio::spawn(async move {
                        store.insert(course("aws-fundamentals", &format!("c{}", i))).await
                    })
                })
                .collect();

            let mut inserted = 0;
            for task in tasks {
                if task.await.unwrap().is_ok() {
                    inserted += 1;
                }
            }
            assert_eq!(inserted, 1);

            let live = store
                .find_many(&FieldFilter::new().eq("slug", "aws-fundamentals"), Page::default())
                .await
                .unwrap();
            assert_eq!(live.len(), 1);
        }
    }
}
