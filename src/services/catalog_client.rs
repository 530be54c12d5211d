//! Course lookup for certificate issuance
//!
//! The certificate service only needs to know that a course exists and what
//! it is called. [`LocalCourseDirectory`] asks the in-process course service;
//! [`HttpCourseDirectory`] asks a catalog deployed elsewhere over its v2 API.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::identifier::{IdentifierResolver, Rejection, Resolution, ResolverPolicy};
use crate::types::{Result, ServiceError};

use super::course_service::CourseService;

/// Minimal course facts needed to issue a certificate
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CourseSummary {
    pub slug: String,
    pub title: String,
}

/// Source of truth for course existence
#[async_trait]
pub trait CourseDirectory: Send + Sync {
    /// Look a course up by slug. `Ok(None)` when it does not exist.
    async fn lookup(&self, slug: &str) -> Result<Option<CourseSummary>>;

    /// Name reported by `/status`
    fn name(&self) -> &'static str;
}

/// Directory backed by the local course service
pub struct LocalCourseDirectory {
    courses: Arc<CourseService>,
    resolver: IdentifierResolver,
}

impl LocalCourseDirectory {
    pub fn new(courses: Arc<CourseService>) -> Self {
        Self {
            courses,
            resolver: IdentifierResolver::with_policy(ResolverPolicy::STRICT),
        }
    }
}

#[async_trait]
impl CourseDirectory for LocalCourseDirectory {
    async fn lookup(&self, slug: &str) -> Result<Option<CourseSummary>> {
        match self.courses.resolve(&self.resolver, slug).await? {
            Resolution::Found { resource, .. } => Ok(Some(CourseSummary {
                slug: resource.slug,
                title: resource.title,
            })),
            Resolution::NotFound => Ok(None),
            Resolution::Rejected(Rejection::Legacy(shape)) => Err(ServiceError::InvalidSlug(
                format!("'{}' is a legacy {} identifier, not a course slug", slug, shape.as_str()),
            )),
            Resolution::Rejected(Rejection::Malformed) => Err(ServiceError::InvalidSlug(format!(
                "'{}' is not a valid course slug",
                slug
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Envelope returned by the catalog's v2 course endpoint
#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    #[serde(default)]
    data: Option<CourseSummary>,
}

/// Directory backed by a remote catalog
pub struct HttpCourseDirectory {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpCourseDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("academy/1.0")
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    /// URL of a course on the remote catalog
    pub fn course_url(&self, slug: &str) -> String {
        format!("{}/api/v2/courses/{}", self.base_url, urlencoding::encode(slug))
    }
}

#[async_trait]
impl CourseDirectory for HttpCourseDirectory {
    async fn lookup(&self, slug: &str) -> Result<Option<CourseSummary>> {
        let url = self.course_url(slug);
        debug!(url = %url, "Looking up course in remote catalog");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("catalog request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            warn!(url = %url, status = %status, "Catalog lookup failed");
            return Err(ServiceError::Upstream(format!("HTTP {} from {}", status, url)));
        }

        let envelope: CatalogEnvelope = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("invalid catalog response: {}", e)))?;

        envelope
            .data
            .map(Some)
            .ok_or_else(|| ServiceError::Upstream(format!("catalog response from {} had no data", url)))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCollection;
    use crate::services::course_service::CreateCourseInput;
    use crate::services::events::EventBus;

    #[test]
    fn test_course_url() {
        let directory = HttpCourseDirectory::new("http://catalog:8080/", Duration::from_secs(1));
        assert_eq!(
            directory.course_url("aws-fundamentals"),
            "http://catalog:8080/api/v2/courses/aws-fundamentals"
        );
        assert_eq!(
            directory.course_url("a b"),
            "http://catalog:8080/api/v2/courses/a%20b"
        );
    }

    #[test]
    fn test_envelope_parsing() {
        let body = r#"{"success":true,"message":"ok","data":{"id":"x","slug":"aws-fundamentals","title":"AWS Fundamentals","tags":[]}}"#;
        let envelope: CatalogEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.data.unwrap().title, "AWS Fundamentals");
    }

    #[tokio::test]
    async fn test_local_directory() {
        let courses = Arc::new(CourseService::new(
            Arc::new(MemoryCollection::new()),
            Arc::new(EventBus::new()),
        ));
        courses
            .create(CreateCourseInput {
                title: "AWS Fundamentals".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let directory = LocalCourseDirectory::new(courses);
        let found = directory.lookup("aws-fundamentals").await.unwrap().unwrap();
        assert_eq!(found.title, "AWS Fundamentals");
        assert!(directory.lookup("gcp-fundamentals").await.unwrap().is_none());
        assert_eq!(
            directory.lookup("AWS!").await.unwrap_err().code(),
            "INVALID_SLUG_FORMAT"
        );
    }
}
