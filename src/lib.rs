//! Academy - REST gateway for a course catalog
//!
//! Serves courses, learning paths, certificates, bookmarks and marketing
//! funnels over HTTP, backed by MongoDB. Courses, paths, funnels and email
//! sequences are addressed by human-readable slugs.
//!
//! ## API generations
//!
//! - **v1**: accepts slugs and, for compatibility, native MongoDB ObjectIds
//! - **v2**: slugs only; legacy identifiers get 410 with migration guidance
//!
//! ## Services
//!
//! - **Catalog**: courses and learning paths
//! - **Certificates**: issuance against the catalog, verification by code
//! - **Bookmarks**: per-user saved courses and paths
//! - **Marketing**: funnels, email sequences and lead enrollment
//! - **Events**: in-process catalog event bus, optionally forwarded to NATS

pub mod config;
pub mod db;
pub mod identifier;
pub mod nats;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{dispatch, run, AppState};
pub use types::{Result, ServiceError};
