//! Bookmark service - per-user saved courses and paths

use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::{BookmarkDoc, BookmarkKind, CourseDoc, LearningPathDoc};
use crate::db::{DocumentCollection, FieldFilter, Page, ResourceRepository, SlugRepository};
use crate::identifier::is_valid_slug;
use crate::types::{Result, ServiceError};

use super::events::{CatalogEvent, EventBus};

/// Input for adding a bookmark
#[derive(Debug, Clone, Deserialize)]
pub struct AddBookmarkInput {
    /// `course` or `path`
    pub kind: String,
    pub slug: String,
    #[serde(default)]
    pub note: Option<String>,
}

pub struct BookmarkService {
    collection: Arc<dyn DocumentCollection<BookmarkDoc>>,
    courses: SlugRepository<CourseDoc>,
    paths: SlugRepository<LearningPathDoc>,
    events: Arc<EventBus>,
}

impl BookmarkService {
    pub fn new(
        collection: Arc<dyn DocumentCollection<BookmarkDoc>>,
        courses: Arc<dyn DocumentCollection<CourseDoc>>,
        paths: Arc<dyn DocumentCollection<LearningPathDoc>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            collection,
            courses: SlugRepository::new(courses),
            paths: SlugRepository::new(paths),
            events,
        }
    }

    pub async fn list(
        &self,
        user_id: &str,
        kind: Option<&str>,
        page: Page,
    ) -> Result<Vec<BookmarkDoc>> {
        let kind = kind.map(parse_kind).transpose()?;
        let filter = FieldFilter::new()
            .eq("user_id", user_id)
            .eq_opt("resource_kind", kind.map(BookmarkKind::as_str));
        self.collection.find_many(&filter, page).await
    }

    /// Bookmark an existing course or path
    pub async fn add(&self, user_id: &str, input: AddBookmarkInput) -> Result<BookmarkDoc> {
        let kind = parse_kind(&input.kind)?;
        if !is_valid_slug(&input.slug) {
            return Err(ServiceError::InvalidSlug(format!(
                "'{}' is not a valid slug",
                input.slug
            )));
        }

        let exists = match kind {
            BookmarkKind::Course => self.courses.find_by_slug(&input.slug).await?.is_some(),
            BookmarkKind::Path => self.paths.find_by_slug(&input.slug).await?.is_some(),
        };
        if !exists {
            let resource = kind.resource_kind();
            return Err(ServiceError::not_found(
                resource.not_found_code(),
                format!("{} '{}' not found", resource.label(), input.slug),
            ));
        }

        if self.find(user_id, kind, &input.slug).await?.is_some() {
            return Err(ServiceError::conflict(
                "BOOKMARK_EXISTS",
                format!("{} '{}' is already bookmarked", kind.as_str(), input.slug),
            ));
        }

        let mut bookmark = BookmarkDoc {
            user_id: user_id.to_string(),
            resource_kind: kind,
            resource_slug: input.slug,
            note: input.note.filter(|n| !n.trim().is_empty()),
            ..Default::default()
        };
        let id = self.collection.insert(bookmark.clone()).await?;
        bookmark.id = Some(id);

        self.events.emit(CatalogEvent::BookmarkAdded {
            user_id: user_id.to_string(),
            kind: kind.as_str().to_string(),
            slug: bookmark.resource_slug.clone(),
        });
        Ok(bookmark)
    }

    pub async fn remove(&self, user_id: &str, kind: &str, slug: &str) -> Result<()> {
        let kind = parse_kind(kind)?;
        let bookmark = self.find(user_id, kind, slug).await?.ok_or_else(|| {
            ServiceError::not_found(
                "BOOKMARK_NOT_FOUND",
                format!("No {} bookmark for '{}'", kind.as_str(), slug),
            )
        })?;

        if let Some(id) = bookmark.id {
            self.collection.soft_delete(&id).await?;
        }

        self.events.emit(CatalogEvent::BookmarkRemoved {
            user_id: user_id.to_string(),
            kind: kind.as_str().to_string(),
            slug: slug.to_string(),
        });
        Ok(())
    }

    async fn find(&self, user_id: &str, kind: BookmarkKind, slug: &str) -> Result<Option<BookmarkDoc>> {
        self.collection
            .find_one(
                &FieldFilter::new()
                    .eq("user_id", user_id)
                    .eq("resource_kind", kind.as_str())
                    .eq("resource_slug", slug),
            )
            .await
    }
}

fn parse_kind(raw: &str) -> Result<BookmarkKind> {
    BookmarkKind::parse(raw).ok_or_else(|| {
        ServiceError::InvalidInput(format!("kind must be 'course' or 'path' (got '{}')", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCollection;

    async fn service() -> BookmarkService {
        let courses: Arc<dyn DocumentCollection<CourseDoc>> = Arc::new(MemoryCollection::new());
        courses
            .insert(CourseDoc {
                title: "AWS Fundamentals".into(),
                slug: "aws-fundamentals".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        BookmarkService::new(
            Arc::new(MemoryCollection::new()),
            courses,
            Arc::new(MemoryCollection::new()),
            Arc::new(EventBus::new()),
        )
    }

    fn input(kind: &str, slug: &str) -> AddBookmarkInput {
        AddBookmarkInput {
            kind: kind.into(),
            slug: slug.into(),
            note: Some("  ".into()),
        }
    }

    #[tokio::test]
    async fn test_add_list_remove() {
        let service = service().await;
        let bookmark = service.add("u1", input("course", "aws-fundamentals")).await.unwrap();
        assert_eq!(bookmark.note, None);

        let err = service
            .add("u1", input("course", "aws-fundamentals"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "BOOKMARK_EXISTS");

        assert_eq!(service.list("u1", None, Page::default()).await.unwrap().len(), 1);
        assert!(service
            .list("u1", Some("path"), Page::default())
            .await
            .unwrap()
            .is_empty());
        assert!(service.list("u2", None, Page::default()).await.unwrap().is_empty());

        service.remove("u1", "course", "aws-fundamentals").await.unwrap();
        assert!(service.list("u1", None, Page::default()).await.unwrap().is_empty());
        assert_eq!(
            service
                .remove("u1", "course", "aws-fundamentals")
                .await
                .unwrap_err()
                .code(),
            "BOOKMARK_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_add_validation() {
        let service = service().await;
        assert_eq!(
            service.add("u1", input("video", "aws-fundamentals")).await.unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            service.add("u1", input("path", "aws-fundamentals")).await.unwrap_err().code(),
            "PATH_NOT_FOUND"
        );
        assert_eq!(
            service.add("u1", input("course", "AWS")).await.unwrap_err().code(),
            "INVALID_SLUG_FORMAT"
        );
    }
}
