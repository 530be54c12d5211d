//! Course service - business logic for the course catalog
//!
//! Wraps the course collection with slug assignment, validation and event
//! emission. Lookups by public identifier go through the caller's
//! [`IdentifierResolver`], so v1 and v2 routes share this service.

use serde::Deserialize;
use std::sync::Arc;

use crate::db::schemas::{CourseDoc, CourseLevel};
use crate::db::{DocumentCollection, FieldFilter, Page, ResourceRepository, SlugRepository};
use crate::identifier::{IdentifierResolver, Resolution};
use crate::types::{Result, ServiceError};

use super::events::{CatalogEvent, EventBus};
use super::slugs::allocate_slug;

/// Input for creating a course
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateCourseInput {
    pub title: String,
    /// Explicit slug; derived from the title when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructor: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

/// Partial update; the slug cannot change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourseInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub instructor: Option<String>,
    pub category: Option<String>,
    pub level: Option<String>,
    pub price_cents: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub published: Option<bool>,
}

/// List filters
#[derive(Debug, Clone, Default)]
pub struct CourseQuery {
    pub category: Option<String>,
    pub level: Option<String>,
    pub tag: Option<String>,
    pub published: Option<bool>,
    pub page: Page,
}

/// Course service for business logic
pub struct CourseService {
    repo: SlugRepository<CourseDoc>,
    events: Arc<EventBus>,
}

impl CourseService {
    pub fn new(collection: Arc<dyn DocumentCollection<CourseDoc>>, events: Arc<EventBus>) -> Self {
        Self {
            repo: SlugRepository::new(collection),
            events,
        }
    }

    pub fn repository(&self) -> &SlugRepository<CourseDoc> {
        &self.repo
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Resolve a public identifier under the resolver's policy
    pub async fn resolve(
        &self,
        resolver: &IdentifierResolver,
        identifier: &str,
    ) -> Result<Resolution<CourseDoc>> {
        resolver.resolve(&self.repo, identifier).await
    }

    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<CourseDoc>> {
        self.repo.find_by_slug(slug).await
    }

    pub async fn list(&self, query: CourseQuery) -> Result<Vec<CourseDoc>> {
        let level = match query.level.as_deref() {
            Some(raw) => Some(parse_level(raw)?.as_str()),
            None => None,
        };

        let filter = FieldFilter::new()
            .eq_opt("category", query.category)
            .eq_opt("level", level)
            .eq_opt("tags", query.tag.map(|t| t.trim().to_lowercase()))
            .eq_opt("published", query.published);

        self.repo.collection().find_many(&filter, query.page).await
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    pub async fn create(&self, input: CreateCourseInput) -> Result<CourseDoc> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::InvalidInput("title is required".into()));
        }
        validate_price(input.price_cents)?;
        let level = match input.level.as_deref() {
            Some(raw) => parse_level(raw)?,
            None => CourseLevel::default(),
        };

        let slug = allocate_slug(&self.repo, &title, input.slug.as_deref()).await?;

        let mut course = CourseDoc {
            title,
            slug,
            description: input.description,
            instructor: input.instructor,
            category: input.category,
            level,
            price_cents: input.price_cents,
            tags: normalize_tags(input.tags),
            published: input.published,
            ..Default::default()
        };

        let id = self.repo.collection().insert(course.clone()).await?;
        course.id = Some(id);
        // Re-read to pick up stamped metadata
        let course = self
            .repo
            .collection()
            .find_by_id(&id)
            .await?
            .unwrap_or(course);

        self.events.emit(CatalogEvent::CourseCreated {
            id: id.to_hex(),
            slug: course.slug.clone(),
            title: course.title.clone(),
        });

        Ok(course)
    }

    /// Apply an update to a resolved course
    pub async fn update(&self, mut course: CourseDoc, input: UpdateCourseInput) -> Result<CourseDoc> {
        let id = course
            .id
            .ok_or_else(|| ServiceError::Internal("course has no id".into()))?;

        if let Some(slug) = &input.slug {
            if slug != &course.slug {
                return Err(ServiceError::InvalidInput(
                    "slug is assigned at creation and cannot be changed".into(),
                ));
            }
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ServiceError::InvalidInput("title must not be empty".into()));
            }
            course.title = title;
        }
        if let Some(description) = input.description {
            course.description = description;
        }
        if let Some(instructor) = input.instructor {
            course.instructor = instructor;
        }
        if let Some(category) = input.category {
            course.category = category;
        }
        if let Some(level) = input.level {
            course.level = parse_level(&level)?;
        }
        if let Some(price) = input.price_cents {
            validate_price(price)?;
            course.price_cents = price;
        }
        if let Some(tags) = input.tags {
            course.tags = normalize_tags(tags);
        }
        if let Some(published) = input.published {
            course.published = published;
        }

        if !self.repo.collection().replace(&id, course.clone()).await? {
            return Err(ServiceError::not_found(
                "COURSE_NOT_FOUND",
                format!("Course '{}' not found", course.slug),
            ));
        }

        self.events.emit(CatalogEvent::CourseUpdated {
            id: id.to_hex(),
            slug: course.slug.clone(),
        });

        Ok(self.repo.collection().find_by_id(&id).await?.unwrap_or(course))
    }

    /// Soft-delete a resolved course, releasing its slug
    pub async fn delete(&self, course: &CourseDoc) -> Result<bool> {
        let Some(id) = course.id else {
            return Ok(false);
        };

        let deleted = self.repo.collection().soft_delete(&id).await?;
        if deleted {
            self.events.emit(CatalogEvent::CourseDeleted {
                id: id.to_hex(),
                slug: course.slug.clone(),
            });
        }
        Ok(deleted)
    }
}

fn parse_level(raw: &str) -> Result<CourseLevel> {
    CourseLevel::parse(&raw.to_lowercase()).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "level must be one of beginner, intermediate, advanced (got '{}')",
            raw
        ))
    })
}

fn validate_price(price_cents: i64) -> Result<()> {
    if price_cents < 0 {
        return Err(ServiceError::InvalidInput("price_cents must not be negative".into()));
    }
    Ok(())
}

/// Lowercase, trim and de-duplicate tags, keeping first occurrence order
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCollection;
    use crate::identifier::{MatchedBy, Rejection, ResolverPolicy};

    fn service() -> (CourseService, Arc<EventBus>) {
        let events = Arc::new(EventBus::new());
        (
            CourseService::new(Arc::new(MemoryCollection::new()), events.clone()),
            events,
        )
    }

    fn input(title: &str) -> CreateCourseInput {
        CreateCourseInput {
            title: title.into(),
            category: "cloud".into(),
            tags: vec!["AWS".into(), "aws".into(), " Cloud ".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_assigns_slug_and_emits() {
        let (service, events) = service();
        let mut rx = events.subscribe();

        let course = service.create(input("AWS Fundamentals")).await.unwrap();
        assert_eq!(course.slug, "aws-fundamentals");
        assert_eq!(course.tags, vec!["aws", "cloud"]);
        assert!(course.id.is_some());
        assert!(course.metadata.created_at.is_some());

        let event = rx.try_recv().unwrap();
        assert_eq!(event.name(), "course_created");

        let second = service.create(input("AWS Fundamentals")).await.unwrap();
        assert_eq!(second.slug, "aws-fundamentals-2");
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (service, _) = service();
        let err = service.create(input("   ")).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let mut bad_level = input("Kubernetes");
        bad_level.level = Some("expert".into());
        assert_eq!(service.create(bad_level).await.unwrap_err().code(), "INVALID_INPUT");

        let mut negative = input("Kubernetes");
        negative.price_cents = -1;
        assert_eq!(service.create(negative).await.unwrap_err().code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_resolve_under_both_policies() {
        let (service, _) = service();
        let course = service.create(input("AWS Fundamentals")).await.unwrap();
        let hex = course.id.unwrap().to_hex();

        let compatible = IdentifierResolver::with_policy(ResolverPolicy::LEGACY_COMPATIBLE);
        match service.resolve(&compatible, &hex).await.unwrap() {
            Resolution::Found { matched_by, .. } => assert_eq!(matched_by, MatchedBy::NativeId),
            other => panic!("unexpected {other:?}"),
        }

        let strict = IdentifierResolver::with_policy(ResolverPolicy::STRICT);
        assert!(matches!(
            service.resolve(&strict, &hex).await.unwrap(),
            Resolution::Rejected(Rejection::Legacy(_))
        ));
        assert!(service
            .resolve(&strict, "aws-fundamentals")
            .await
            .unwrap()
            .into_found()
            .is_some());
    }

    #[tokio::test]
    async fn test_update_keeps_slug() {
        let (service, _) = service();
        let course = service.create(input("AWS Fundamentals")).await.unwrap();

        let updated = service
            .update(
                course.clone(),
                UpdateCourseInput {
                    title: Some("AWS Fundamentals (2026)".into()),
                    level: Some("Advanced".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.slug, "aws-fundamentals");
        assert_eq!(updated.title, "AWS Fundamentals (2026)");
        assert_eq!(updated.level, CourseLevel::Advanced);

        let err = service
            .update(
                updated,
                UpdateCourseInput {
                    slug: Some("renamed".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_delete_releases_slug() {
        let (service, _) = service();
        let course = service.create(input("AWS Fundamentals")).await.unwrap();

        assert!(service.delete(&course).await.unwrap());
        assert!(service.find_by_slug("aws-fundamentals").await.unwrap().is_none());

        let again = service.create(input("AWS Fundamentals")).await.unwrap();
        assert_eq!(again.slug, "aws-fundamentals");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (service, _) = service();
        service.create(input("AWS Fundamentals")).await.unwrap();
        let mut data = input("SQL Basics");
        data.category = "data".into();
        data.level = Some("intermediate".into());
        data.tags = vec!["sql".into()];
        service.create(data).await.unwrap();

        let cloud = service
            .list(CourseQuery {
                category: Some("cloud".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(cloud.len(), 1);

        let intermediate = service
            .list(CourseQuery {
                level: Some("intermediate".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(intermediate[0].slug, "sql-basics");

        let tagged = service
            .list(CourseQuery {
                tag: Some("aws".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(tagged[0].slug, "aws-fundamentals");

        assert!(service
            .list(CourseQuery {
                level: Some("expert".into()),
                ..Default::default()
            })
            .await
            .is_err());
    }
}
