//! Path service - business logic for learning paths
//!
//! A learning path references courses by slug. Listing a path's courses
//! skips references whose course no longer exists and reports them.

use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::db::schemas::{CourseDoc, CourseLevel, LearningPathDoc};
use crate::db::{DocumentCollection, FieldFilter, Page, ResourceRepository, SlugRepository};
use crate::identifier::{is_valid_slug, IdentifierResolver, Resolution};
use crate::types::{Result, ServiceError};

use super::events::{CatalogEvent, EventBus};
use super::slugs::allocate_slug;

/// Most course references a single path may hold
pub const MAX_PATH_COURSES: usize = 100;

/// Input for creating a learning path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePathInput {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub course_slugs: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub estimated_hours: u32,
    #[serde(default)]
    pub published: bool,
}

/// Partial update; the slug cannot change
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePathInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub course_slugs: Option<Vec<String>>,
    pub difficulty: Option<String>,
    pub estimated_hours: Option<u32>,
    pub published: Option<bool>,
}

/// A path's courses in study order
#[derive(Debug, Clone)]
pub struct PathCourses {
    pub courses: Vec<CourseDoc>,
    /// Referenced slugs with no live course
    pub missing: Vec<String>,
}

/// Path service for business logic
pub struct PathService {
    repo: SlugRepository<LearningPathDoc>,
    courses: SlugRepository<CourseDoc>,
    events: Arc<EventBus>,
}

impl PathService {
    pub fn new(
        collection: Arc<dyn DocumentCollection<LearningPathDoc>>,
        courses: Arc<dyn DocumentCollection<CourseDoc>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            repo: SlugRepository::new(collection),
            courses: SlugRepository::new(courses),
            events,
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    pub async fn resolve(
        &self,
        resolver: &IdentifierResolver,
        identifier: &str,
    ) -> Result<Resolution<LearningPathDoc>> {
        resolver.resolve(&self.repo, identifier).await
    }

    /// List paths, optionally only those containing a course
    pub async fn list(
        &self,
        course_slug: Option<String>,
        published: Option<bool>,
        page: Page,
    ) -> Result<Vec<LearningPathDoc>> {
        let filter = FieldFilter::new()
            .eq_opt("course_slugs", course_slug)
            .eq_opt("published", published);
        self.repo.collection().find_many(&filter, page).await
    }

    /// Courses of a resolved path, in path order
    pub async fn courses_of(&self, path: &LearningPathDoc) -> Result<PathCourses> {
        let mut courses = Vec::with_capacity(path.course_slugs.len());
        let mut missing = Vec::new();

        for slug in &path.course_slugs {
            match self.courses.find_by_slug(slug).await? {
                Some(course) => courses.push(course),
                None => missing.push(slug.clone()),
            }
        }

        if !missing.is_empty() {
            debug!(path = %path.slug, missing = ?missing, "Path references missing courses");
        }

        Ok(PathCourses { courses, missing })
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    pub async fn create(&self, input: CreatePathInput) -> Result<LearningPathDoc> {
        let title = input.title.trim().to_string();
        if title.is_empty() {
            return Err(ServiceError::InvalidInput("title is required".into()));
        }
        let course_slugs = validate_course_slugs(input.course_slugs)?;
        let difficulty = match input.difficulty.as_deref() {
            Some(raw) => parse_difficulty(raw)?,
            None => CourseLevel::default(),
        };

        let slug = allocate_slug(&self.repo, &title, input.slug.as_deref()).await?;

        let path = LearningPathDoc {
            title,
            slug,
            description: input.description,
            course_slugs,
            difficulty,
            estimated_hours: input.estimated_hours,
            published: input.published,
            ..Default::default()
        };

        let id = self.repo.collection().insert(path.clone()).await?;
        let path = self
            .repo
            .collection()
            .find_by_id(&id)
            .await?
            .ok_or_else(|| ServiceError::Database("inserted path not readable".into()))?;

        self.events.emit(CatalogEvent::PathCreated {
            id: id.to_hex(),
            slug: path.slug.clone(),
            title: path.title.clone(),
        });

        Ok(path)
    }

    pub async fn update(
        &self,
        mut path: LearningPathDoc,
        input: UpdatePathInput,
    ) -> Result<LearningPathDoc> {
        let id = path
            .id
            .ok_or_else(|| ServiceError::Internal("path has no id".into()))?;

        if input.slug.as_ref().is_some_and(|s| s != &path.slug) {
            return Err(ServiceError::InvalidInput(
                "slug is assigned at creation and cannot be changed".into(),
            ));
        }

        if let Some(title) = input.title {
            let title = title.trim().to_string();
            if title.is_empty() {
                return Err(ServiceError::InvalidInput("title must not be empty".into()));
            }
            path.title = title;
        }
        if let Some(description) = input.description {
            path.description = description;
        }
        if let Some(slugs) = input.course_slugs {
            path.course_slugs = validate_course_slugs(slugs)?;
        }
        if let Some(difficulty) = input.difficulty {
            path.difficulty = parse_difficulty(&difficulty)?;
        }
        if let Some(hours) = input.estimated_hours {
            path.estimated_hours = hours;
        }
        if let Some(published) = input.published {
            path.published = published;
        }

        if !self.repo.collection().replace(&id, path.clone()).await? {
            return Err(ServiceError::not_found(
                "PATH_NOT_FOUND",
                format!("Learning path '{}' not found", path.slug),
            ));
        }

        self.events.emit(CatalogEvent::PathUpdated {
            id: id.to_hex(),
            slug: path.slug.clone(),
        });

        Ok(self.repo.collection().find_by_id(&id).await?.unwrap_or(path))
    }

    pub async fn delete(&self, path: &LearningPathDoc) -> Result<bool> {
        let Some(id) = path.id else {
            return Ok(false);
        };

        let deleted = self.repo.collection().soft_delete(&id).await?;
        if deleted {
            self.events.emit(CatalogEvent::PathDeleted {
                id: id.to_hex(),
                slug: path.slug.clone(),
            });
        }
        Ok(deleted)
    }
}

/// Course references must be slugs; repeats are dropped
fn validate_course_slugs(slugs: Vec<String>) -> Result<Vec<String>> {
    if slugs.len() > MAX_PATH_COURSES {
        return Err(ServiceError::InvalidInput(format!(
            "a learning path holds at most {} courses",
            MAX_PATH_COURSES
        )));
    }
    let mut out: Vec<String> = Vec::with_capacity(slugs.len());
    for slug in slugs {
        if !is_valid_slug(&slug) {
            return Err(ServiceError::InvalidSlug(format!(
                "course reference '{}' is not a valid slug",
                slug
            )));
        }
        if !out.contains(&slug) {
            out.push(slug);
        }
    }
    Ok(out)
}

fn parse_difficulty(raw: &str) -> Result<CourseLevel> {
    CourseLevel::parse(&raw.to_lowercase()).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "difficulty must be one of beginner, intermediate, advanced (got '{}')",
            raw
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCollection;
    use crate::services::course_service::{CourseService, CreateCourseInput};

    fn services() -> (PathService, CourseService) {
        let events = Arc::new(EventBus::new());
        let courses: Arc<dyn DocumentCollection<CourseDoc>> = Arc::new(MemoryCollection::new());
        (
            PathService::new(Arc::new(MemoryCollection::new()), courses.clone(), events.clone()),
            CourseService::new(courses, events),
        )
    }

    #[tokio::test]
    async fn test_courses_in_order_with_missing() {
        let (paths, courses) = services();
        for title in ["Rust Basics", "Async Rust"] {
            courses
                .create(CreateCourseInput {
                    title: title.into(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let path = paths
            .create(CreatePathInput {
                title: "Rust Developer".into(),
                course_slugs: vec![
                    "async-rust".into(),
                    "unsafe-rust".into(),
                    "rust-basics".into(),
                    "async-rust".into(),
                ],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(path.slug, "rust-developer");
        assert_eq!(path.course_slugs.len(), 3);

        let listing = paths.courses_of(&path).await.unwrap();
        let slugs: Vec<_> = listing.courses.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs, vec!["async-rust", "rust-basics"]);
        assert_eq!(listing.missing, vec!["unsafe-rust"]);
    }

    #[tokio::test]
    async fn test_invalid_course_reference() {
        let (paths, _) = services();
        let err = paths
            .create(CreatePathInput {
                title: "Broken".into(),
                course_slugs: vec!["Not A Slug".into()],
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SLUG_FORMAT");
    }

    #[tokio::test]
    async fn test_course_list_is_bounded() {
        let (paths, _) = services();
        let slugs = |n: usize| (0..n).map(|i| format!("course-{}", i)).collect::<Vec<_>>();

        let err = paths
            .create(CreatePathInput {
                title: "Everything".into(),
                course_slugs: slugs(MAX_PATH_COURSES + 1),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let path = paths
            .create(CreatePathInput {
                title: "Nearly Everything".into(),
                course_slugs: slugs(MAX_PATH_COURSES),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(path.course_slugs.len(), MAX_PATH_COURSES);
    }

    #[tokio::test]
    async fn test_list_by_course_and_update() {
        let (paths, _) = services();
        let path = paths
            .create(CreatePathInput {
                title: "Cloud Engineer".into(),
                course_slugs: vec!["aws-fundamentals".into()],
                ..Default::default()
            })
            .await
            .unwrap();

        let found = paths
            .list(Some("aws-fundamentals".into()), None, Page::default())
            .await
            .unwrap();
        assert_eq!(found.len(), 1);

        let updated = paths
            .update(
                path,
                UpdatePathInput {
                    course_slugs: Some(vec!["gcp-fundamentals".into()]),
                    estimated_hours: Some(12),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.estimated_hours, 12);
        assert!(paths
            .list(Some("aws-fundamentals".into()), None, Page::default())
            .await
            .unwrap()
            .is_empty());
    }
}
