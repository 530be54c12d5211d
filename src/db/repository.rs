//! Slug-addressed lookups
//!
//! [`ResourceRepository`] is the narrow interface the identifier resolver
//! needs. [`SlugRepository`] implements it over any collection whose
//! documents carry a slug.

use async_trait::async_trait;
use bson::oid::ObjectId;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::db::{DocumentCollection, FieldFilter, StoredDocument};
use crate::identifier::ResourceKind;
use crate::types::Result;

/// Lookup interface used by the identifier resolver
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    type Resource: Send;

    fn kind(&self) -> ResourceKind;

    /// Look up by native store ID (24 hex characters)
    async fn find_by_id(&self, id: &str) -> Result<Option<Self::Resource>>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Self::Resource>>;
}

/// Stored document addressed by slug
pub trait SlugDocument: StoredDocument + Clone {
    const KIND: ResourceKind;

    fn slug(&self) -> &str;
}

/// [`ResourceRepository`] over a document collection
pub struct SlugRepository<T> {
    collection: Arc<dyn DocumentCollection<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: SlugDocument> SlugRepository<T> {
    pub fn new(collection: Arc<dyn DocumentCollection<T>>) -> Self {
        Self {
            collection,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection<T>> {
        &self.collection
    }

    /// Whether a live document already holds the slug
    pub async fn slug_taken(&self, slug: &str) -> Result<bool> {
        Ok(self.find_by_slug(slug).await?.is_some())
    }
}

impl<T> Clone for SlugRepository<T> {
    fn clone(&self) -> Self {
        Self {
            collection: Arc::clone(&self.collection),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: SlugDocument> ResourceRepository for SlugRepository<T> {
    type Resource = T;

    fn kind(&self) -> ResourceKind {
        T::KIND
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        // Not an ObjectId means no document can carry it
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.collection.find_by_id(&oid).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<T>> {
        self.collection
            .find_one(&FieldFilter::new().eq("slug", slug))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::CourseDoc;
    use crate::db::MemoryCollection;

    #[tokio::test]
    async fn test_lookup_by_id_and_slug() {
        let repo = SlugRepository::<CourseDoc>::new(Arc::new(MemoryCollection::new()));
        let id = repo
            .collection()
            .insert(CourseDoc {
                title: "AWS Fundamentals".into(),
                slug: "aws-fundamentals".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let by_id = repo.find_by_id(&id.to_hex()).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "aws-fundamentals");
        let upper = repo.find_by_id(&id.to_hex().to_uppercase()).await.unwrap();
        assert!(upper.is_some());

        assert!(repo.find_by_slug("aws-fundamentals").await.unwrap().is_some());
        assert!(repo.find_by_slug("gcp-fundamentals").await.unwrap().is_none());
        assert!(repo.find_by_id("not-an-id").await.unwrap().is_none());
        assert!(repo.slug_taken("aws-fundamentals").await.unwrap());
        assert_eq!(repo.kind(), ResourceKind::Course);
    }
}
