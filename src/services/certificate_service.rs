//! Certificate service - issuing and verifying course certificates
//!
//! Certificates are addressed by a random verification code. The course is
//! confirmed through a [`CourseDirectory`] at issue time and its title is
//! copied onto the certificate.

use bson::DateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::schemas::{CertificateDoc, USER_COURSE_INDEX, VERIFICATION_CODE_INDEX};
use crate::db::{DocumentCollection, FieldFilter, Page};
use crate::identifier::is_valid_slug;
use crate::types::{Result, ServiceError};

use super::catalog_client::CourseDirectory;
use super::events::{CatalogEvent, EventBus};

/// Code alphabet without easily confused characters (0/O, 1/I/L)
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Groups of four characters joined by hyphens
const CODE_GROUPS: usize = 3;

/// Retries when a generated code collides with an existing one
const CODE_ATTEMPTS: usize = 3;

/// Input for issuing a certificate
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCertificateInput {
    pub user_id: String,
    /// Course slug
    pub course: String,
}

/// Result of checking a verification code
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    pub valid: bool,
    pub revoked: bool,
}

/// Certificate service for business logic
pub struct CertificateService {
    collection: Arc<dyn DocumentCollection<CertificateDoc>>,
    directory: Arc<dyn CourseDirectory>,
    events: Arc<EventBus>,
}

impl CertificateService {
    pub fn new(
        collection: Arc<dyn DocumentCollection<CertificateDoc>>,
        directory: Arc<dyn CourseDirectory>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            collection,
            directory,
            events,
        }
    }

    /// Name of the course directory in use
    pub fn directory_name(&self) -> &'static str {
        self.directory.name()
    }

    pub async fn issue(&self, input: IssueCertificateInput) -> Result<CertificateDoc> {
        let user_id = input.user_id.trim().to_string();
        if user_id.is_empty() {
            return Err(ServiceError::InvalidInput("user_id is required".into()));
        }
        if !is_valid_slug(&input.course) {
            return Err(ServiceError::InvalidSlug(format!(
                "'{}' is not a valid course slug",
                input.course
            )));
        }

        let course = self.directory.lookup(&input.course).await?.ok_or_else(|| {
            ServiceError::not_found(
                "COURSE_NOT_FOUND",
                format!("Course '{}' not found", input.course),
            )
        })?;

        let existing = self
            .collection
            .find_one(
                &FieldFilter::new()
                    .eq("user_id", user_id.as_str())
                    .eq("course_slug", course.slug.as_str()),
            )
            .await?;
        if existing.is_some() {
            return Err(already_issued(&user_id, &course.slug));
        }

        for attempt in 1..=CODE_ATTEMPTS {
            let code = generate_code();
            let certificate = CertificateDoc::new(
                user_id.clone(),
                course.slug.clone(),
                course.title.clone(),
                code.clone(),
            );

            match self.collection.insert(certificate.clone()).await {
                Ok(id) => {
                    info!(user_id = %user_id, course = %course.slug, "Certificate issued");
                    self.events.emit(CatalogEvent::CertificateIssued {
                        user_id: user_id.clone(),
                        course_slug: course.slug.clone(),
                        verification_code: code,
                    });
                    let mut certificate = certificate;
                    certificate.id = Some(id);
                    return Ok(certificate);
                }
                Err(e) if e.conflict_index() == Some(VERIFICATION_CODE_INDEX) => {
                    warn!(attempt, "Verification code collision, retrying");
                }
                // Lost a race with a concurrent issue for the same pair
                Err(e) if e.conflict_index() == Some(USER_COURSE_INDEX) => {
                    return Err(already_issued(&user_id, &course.slug));
                }
                Err(e) => return Err(e),
            }
        }

        Err(ServiceError::Internal("could not allocate a verification code".into()))
    }

    /// Look a certificate up by code and report whether it is still valid
    pub async fn verify(&self, code: &str) -> Result<(CertificateDoc, Verification)> {
        let certificate = self.find_by_code(code).await?;
        let verification = Verification {
            valid: !certificate.revoked,
            revoked: certificate.revoked,
        };
        Ok((certificate, verification))
    }

    pub async fn list_for_user(&self, user_id: &str, page: Page) -> Result<Vec<CertificateDoc>> {
        self.collection
            .find_many(&FieldFilter::new().eq("user_id", user_id), page)
            .await
    }

    /// Revoke a certificate. Revoking twice is a no-op.
    pub async fn revoke(&self, code: &str) -> Result<CertificateDoc> {
        let mut certificate = self.find_by_code(code).await?;
        if certificate.revoked {
            return Ok(certificate);
        }

        let id = certificate
            .id
            .ok_or_else(|| ServiceError::Internal("certificate has no id".into()))?;
        certificate.revoked = true;
        certificate.revoked_at = Some(DateTime::now());

        if !self.collection.replace(&id, certificate.clone()).await? {
            return Err(certificate_not_found(code));
        }

        self.events.emit(CatalogEvent::CertificateRevoked {
            verification_code: certificate.verification_code.clone(),
        });
        Ok(certificate)
    }

    async fn find_by_code(&self, code: &str) -> Result<CertificateDoc> {
        let normalized = normalize_code(code);
        self.collection
            .find_one(&FieldFilter::new().eq("verification_code", normalized))
            .await?
            .ok_or_else(|| certificate_not_found(code))
    }
}

fn already_issued(user_id: &str, course_slug: &str) -> ServiceError {
    ServiceError::conflict(
        "CERTIFICATE_EXISTS",
        format!("User '{}' already holds a certificate for '{}'", user_id, course_slug),
    )
}

fn certificate_not_found(code: &str) -> ServiceError {
    ServiceError::not_found(
        "CERTIFICATE_NOT_FOUND",
        format!("No certificate with verification code '{}'", code),
    )
}

/// Random code such as `K7QM-3XWP-HN2D`
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let groups: Vec<String> = (0..CODE_GROUPS)
        .map(|_| {
            (0..4)
                .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect()
        })
        .collect();
    groups.join("-")
}

/// Codes are matched case-insensitively and without surrounding whitespace
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}
