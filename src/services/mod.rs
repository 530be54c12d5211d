//! Service layer for the academy gateway
//!
//! Services encapsulate business logic between HTTP handlers and document
//! collections. Each service wraps storage operations with:
//! - Input validation and slug assignment
//! - Cross-entity checks (paths → courses, certificates → catalog)
//! - Event emission for audit/notifications
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (routes/*.rs)
//!     ↓
//! Service Layer (business logic, identifier resolution)
//!     ↓
//! DocumentCollection (MongoDB or in-memory)
//! ```

pub mod bookmark_service;
pub mod catalog_client;
pub mod certificate_service;
pub mod course_service;
pub mod events;
pub mod marketing_service;
pub mod path_service;
pub mod slugs;

pub use bookmark_service::BookmarkService;
pub use catalog_client::{CourseDirectory, CourseSummary, HttpCourseDirectory, LocalCourseDirectory};
pub use certificate_service::CertificateService;
pub use course_service::CourseService;
pub use events::{spawn_logging_listener, spawn_nats_forwarder, CatalogEvent, EventBus, EventListener};
pub use marketing_service::MarketingService;
pub use path_service::PathService;

use std::sync::Arc;

use crate::db::Collections;

/// Service container for dependency injection
///
/// Holds all services over shared collections and one event bus.
pub struct Services {
    pub courses: Arc<CourseService>,
    pub paths: Arc<PathService>,
    pub certificates: Arc<CertificateService>,
    pub bookmarks: Arc<BookmarkService>,
    pub marketing: Arc<MarketingService>,
    pub events: Arc<EventBus>,
    backend: &'static str,
}

impl Services {
    /// Create all services. Certificates verify courses against the local
    /// catalog unless a remote directory is given.
    pub fn new(collections: Collections, directory: Option<Arc<dyn CourseDirectory>>) -> Self {
        let events = Arc::new(EventBus::new());

        let courses = Arc::new(CourseService::new(collections.courses.clone(), events.clone()));
        let directory = directory
            .unwrap_or_else(|| Arc::new(LocalCourseDirectory::new(courses.clone())));

        Self {
            paths: Arc::new(PathService::new(
                collections.paths.clone(),
                collections.courses.clone(),
                events.clone(),
            )),
            certificates: Arc::new(CertificateService::new(
                collections.certificates.clone(),
                directory,
                events.clone(),
            )),
            bookmarks: Arc::new(BookmarkService::new(
                collections.bookmarks.clone(),
                collections.courses.clone(),
                collections.paths.clone(),
                events.clone(),
            )),
            marketing: Arc::new(MarketingService::new(
                collections.funnels.clone(),
                collections.sequences.clone(),
                collections.leads.clone(),
                events.clone(),
            )),
            courses,
            events,
            backend: collections.backend(),
        }
    }

    /// In-memory services with the local catalog (dev mode and tests)
    pub fn in_memory() -> Self {
        Self::new(Collections::memory(), None)
    }

    /// Storage backend name
    pub fn backend(&self) -> &'static str {
        self.backend
    }
}
