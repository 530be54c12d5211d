//! Marketing service - funnels, email sequences and leads
//!
//! Funnels and sequences are slug-addressed like courses. Leads are captured
//! into a funnel's first stage, moved between stages, and enrolled into an
//! active email sequence.

use bson::{oid::ObjectId, DateTime};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::db::schemas::{EmailSequenceDoc, FunnelDoc, LeadDoc, SequenceStatus, SequenceStep};
use crate::db::{DocumentCollection, FieldFilter, Page, ResourceRepository, SlugRepository};
use crate::identifier::{is_valid_slug, IdentifierResolver, Resolution};
use crate::types::{Result, ServiceError};

use super::events::{CatalogEvent, EventBus};
use super::slugs::allocate_slug;

/// Longest wait allowed between two sequence steps (one year)
pub const MAX_STEP_DELAY_HOURS: u32 = 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFunnelInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub stages: Vec<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateSequenceInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    /// Funnel slug this sequence belongs to
    #[serde(default)]
    pub funnel: Option<String>,
    #[serde(default)]
    pub steps: Vec<SequenceStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureLeadInput {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Funnel slug
    pub funnel: String,
}

fn default_true() -> bool {
    true
}

/// One scheduled email of an enrollment
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEmail {
    pub step: usize,
    pub subject: String,
    pub send_at: chrono::DateTime<Utc>,
}

/// Enrolled lead and the emails it will receive
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub lead: LeadDoc,
    pub schedule: Vec<ScheduledEmail>,
}

pub struct MarketingService {
    funnels: SlugRepository<FunnelDoc>,
    sequences: SlugRepository<EmailSequenceDoc>,
    leads: Arc<dyn DocumentCollection<LeadDoc>>,
    events: Arc<EventBus>,
}

impl MarketingService {
    pub fn new(
        funnels: Arc<dyn DocumentCollection<FunnelDoc>>,
        sequences: Arc<dyn DocumentCollection<EmailSequenceDoc>>,
        leads: Arc<dyn DocumentCollection<LeadDoc>>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            funnels: SlugRepository::new(funnels),
            sequences: SlugRepository::new(sequences),
            leads,
            events,
        }
    }

    // =========================================================================
    // Funnels
    // =========================================================================

    pub async fn resolve_funnel(
        &self,
        resolver: &IdentifierResolver,
        identifier: &str,
    ) -> Result<Resolution<FunnelDoc>> {
        resolver.resolve(&self.funnels, identifier).await
    }

    pub async fn list_funnels(&self, active: Option<bool>, page: Page) -> Result<Vec<FunnelDoc>> {
        self.funnels
            .collection()
            .find_many(&FieldFilter::new().eq_opt("active", active), page)
            .await
    }

    pub async fn create_funnel(&self, input: CreateFunnelInput) -> Result<FunnelDoc> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".into()));
        }
        let stages = validate_stages(input.stages)?;
        let slug = allocate_slug(&self.funnels, &name, input.slug.as_deref()).await?;

        let mut funnel = FunnelDoc {
            name,
            slug,
            description: input.description,
            stages,
            active: input.active,
            ..Default::default()
        };
        funnel.id = Some(self.funnels.collection().insert(funnel.clone()).await?);

        self.events.emit(CatalogEvent::FunnelCreated {
            slug: funnel.slug.clone(),
            name: funnel.name.clone(),
        });
        Ok(funnel)
    }

    /// Leads in a funnel, optionally restricted to one stage
    pub async fn funnel_leads(
        &self,
        funnel: &FunnelDoc,
        stage: Option<String>,
        page: Page,
    ) -> Result<Vec<LeadDoc>> {
        if let Some(stage) = &stage {
            if !funnel.has_stage(stage) {
                return Err(ServiceError::InvalidInput(format!(
                    "funnel '{}' has no stage '{}'",
                    funnel.slug, stage
                )));
            }
        }

        let filter = FieldFilter::new()
            .eq("funnel_slug", funnel.slug.as_str())
            .eq_opt("stage", stage);
        self.leads.find_many(&filter, page).await
    }

    // =========================================================================
    // Email sequences
    // =========================================================================

    pub async fn resolve_sequence(
        &self,
        resolver: &IdentifierResolver,
        identifier: &str,
    ) -> Result<Resolution<EmailSequenceDoc>> {
        resolver.resolve(&self.sequences, identifier).await
    }

    pub async fn list_sequences(
        &self,
        funnel: Option<String>,
        status: Option<&str>,
        page: Page,
    ) -> Result<Vec<EmailSequenceDoc>> {
        let status = status.map(parse_status).transpose()?;
        let filter = FieldFilter::new()
            .eq_opt("funnel_slug", funnel)
            .eq_opt("status", status.map(SequenceStatus::as_str));
        self.sequences.collection().find_many(&filter, page).await
    }

    /// Create a sequence in draft status
    pub async fn create_sequence(&self, input: CreateSequenceInput) -> Result<EmailSequenceDoc> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("name is required".into()));
        }
        if input.steps.iter().any(|s| s.subject.trim().is_empty()) {
            return Err(ServiceError::InvalidInput("every step needs a subject".into()));
        }
        if input.steps.iter().any(|s| s.delay_hours > MAX_STEP_DELAY_HOURS) {
            return Err(ServiceError::InvalidInput(format!(
                "delay_hours must be at most {}",
                MAX_STEP_DELAY_HOURS
            )));
        }
        if let Some(funnel) = &input.funnel {
            self.require_funnel(funnel).await?;
        }

        let slug = allocate_slug(&self.sequences, &name, input.slug.as_deref()).await?;

        let mut sequence = EmailSequenceDoc {
            name,
            slug,
            funnel_slug: input.funnel,
            steps: input.steps,
            status: SequenceStatus::Draft,
            ..Default::default()
        };
        sequence.id = Some(self.sequences.collection().insert(sequence.clone()).await?);

        self.events.emit(CatalogEvent::SequenceCreated {
            slug: sequence.slug.clone(),
            name: sequence.name.clone(),
        });
        Ok(sequence)
    }

    pub async fn set_sequence_status(
        &self,
        mut sequence: EmailSequenceDoc,
        status: &str,
    ) -> Result<EmailSequenceDoc> {
        let status = parse_status(status)?;
        if status == sequence.status {
            return Ok(sequence);
        }
        if status == SequenceStatus::Active && sequence.steps.is_empty() {
            return Err(ServiceError::InvalidInput(
                "a sequence needs at least one step before it can be activated".into(),
            ));
        }

        let id = sequence
            .id
            .ok_or_else(|| ServiceError::Internal("sequence has no id".into()))?;
        sequence.status = status;
        if !self.sequences.collection().replace(&id, sequence.clone()).await? {
            return Err(ServiceError::not_found(
                "SEQUENCE_NOT_FOUND",
                format!("Email sequence '{}' not found", sequence.slug),
            ));
        }

        self.events.emit(CatalogEvent::SequenceStatusChanged {
            slug: sequence.slug.clone(),
            status: status.as_str().to_string(),
        });
        Ok(sequence)
    }

    // =========================================================================
    // Leads
    // =========================================================================

    /// Capture a lead into a funnel's first stage
    ///
    /// Idempotent per email and funnel: a repeat capture returns the existing
    /// lead with `false`.
    pub async fn capture_lead(&self, input: CaptureLeadInput) -> Result<(LeadDoc, bool)> {
        let email = normalize_email(&input.email)?;
        let funnel = self.require_funnel(&input.funnel).await?;
        if !funnel.active {
            return Err(ServiceError::InvalidInput(format!(
                "funnel '{}' is not accepting leads",
                funnel.slug
            )));
        }

        let existing = self
            .leads
            .find_one(
                &FieldFilter::new()
                    .eq("email", email.as_str())
                    .eq("funnel_slug", funnel.slug.as_str()),
            )
            .await?;
        if let Some(lead) = existing {
            return Ok((lead, false));
        }

        let stage = funnel
            .entry_stage()
            .ok_or_else(|| ServiceError::Internal(format!("funnel '{}' has no stages", funnel.slug)))?
            .to_string();

        let mut lead = LeadDoc::new(email, funnel.slug.clone(), stage);
        lead.name = input.name.filter(|n| !n.trim().is_empty());
        lead.source = input.source.filter(|s| !s.trim().is_empty());
        let id = self.leads.insert(lead.clone()).await?;
        lead.id = Some(id);

        self.events.emit(CatalogEvent::LeadCaptured {
            lead_id: id.to_hex(),
            funnel_slug: lead.funnel_slug.clone(),
            stage: lead.stage.clone(),
        });
        Ok((lead, true))
    }

    /// Move a lead to another stage of its funnel
    pub async fn advance_lead(&self, lead_id: &str, stage: &str) -> Result<LeadDoc> {
        let (id, mut lead) = self.require_lead(lead_id).await?;
        let funnel = self.require_funnel(&lead.funnel_slug).await?;
        if !funnel.has_stage(stage) {
            return Err(ServiceError::InvalidInput(format!(
                "funnel '{}' has no stage '{}'",
                funnel.slug, stage
            )));
        }
        if lead.stage == stage {
            return Ok(lead);
        }

        let from_stage = std::mem::replace(&mut lead.stage, stage.to_string());
        self.leads.replace(&id, lead.clone()).await?;

        self.events.emit(CatalogEvent::LeadAdvanced {
            lead_id: id.to_hex(),
            from_stage,
            to_stage: lead.stage.clone(),
        });
        Ok(lead)
    }

    /// Enroll a lead in an active sequence and compute its email schedule
    pub async fn enroll_lead(&self, lead_id: &str, sequence_slug: &str) -> Result<Enrollment> {
        let (id, mut lead) = self.require_lead(lead_id).await?;

        if !is_valid_slug(sequence_slug) {
            return Err(ServiceError::InvalidSlug(format!(
                "'{}' is not a valid sequence slug",
                sequence_slug
            )));
        }
        let sequence = self.sequences.find_by_slug(sequence_slug).await?.ok_or_else(|| {
            ServiceError::not_found(
                "SEQUENCE_NOT_FOUND",
                format!("Email sequence '{}' not found", sequence_slug),
            )
        })?;

        if sequence.status != SequenceStatus::Active {
            return Err(ServiceError::conflict(
                "SEQUENCE_NOT_ACTIVE",
                format!(
                    "Email sequence '{}' is {}",
                    sequence.slug,
                    sequence.status.as_str()
                ),
            ));
        }
        if let Some(funnel) = &sequence.funnel_slug {
            if funnel != &lead.funnel_slug {
                return Err(ServiceError::InvalidInput(format!(
                    "sequence '{}' belongs to funnel '{}', lead is in '{}'",
                    sequence.slug, funnel, lead.funnel_slug
                )));
            }
        }

        let enrolled_at = DateTime::now();
        let plan = schedule(&sequence.steps, enrolled_at.to_chrono())?;
        lead.sequence_slug = Some(sequence.slug.clone());
        lead.enrolled_at = Some(enrolled_at);
        self.leads.replace(&id, lead.clone()).await?;

        info!(lead_id = %id, sequence = %sequence.slug, "Lead enrolled");
        self.events.emit(CatalogEvent::LeadEnrolled {
            lead_id: id.to_hex(),
            sequence_slug: sequence.slug.clone(),
        });

        Ok(Enrollment {
            lead,
            schedule: plan,
        })
    }

    async fn require_funnel(&self, slug: &str) -> Result<FunnelDoc> {
        self.funnels.find_by_slug(slug).await?.ok_or_else(|| {
            ServiceError::not_found("FUNNEL_NOT_FOUND", format!("Funnel '{}' not found", slug))
        })
    }

    async fn require_lead(&self, lead_id: &str) -> Result<(ObjectId, LeadDoc)> {
        let not_found = || {
            ServiceError::not_found("LEAD_NOT_FOUND", format!("Lead '{}' not found", lead_id))
        };
        let id = ObjectId::parse_str(lead_id).map_err(|_| not_found())?;
        let lead = self.leads.find_by_id(&id).await?.ok_or_else(not_found)?;
        Ok((id, lead))
    }
}

/// Send times for each step, delays accumulating from enrollment
pub fn schedule(
    steps: &[SequenceStep],
    start: chrono::DateTime<Utc>,
) -> Result<Vec<ScheduledEmail>> {
    let mut at = start;
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            at = at
                .checked_add_signed(Duration::hours(i64::from(step.delay_hours)))
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!(
                        "step {} is scheduled past the supported date range",
                        i + 1
                    ))
                })?;
            Ok(ScheduledEmail {
                step: i + 1,
                subject: step.subject.clone(),
                send_at: at,
            })
        })
        .collect()
}

fn validate_stages(stages: Vec<String>) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(stages.len());
    for stage in stages {
        let stage = stage.trim().to_string();
        if stage.is_empty() {
            return Err(ServiceError::InvalidInput("stage names must not be empty".into()));
        }
        if out.contains(&stage) {
            return Err(ServiceError::InvalidInput(format!("duplicate stage '{}'", stage)));
        }
        out.push(stage);
    }
    if out.is_empty() {
        return Err(ServiceError::InvalidInput("a funnel needs at least one stage".into()));
    }
    Ok(out)
}

fn parse_status(raw: &str) -> Result<SequenceStatus> {
    SequenceStatus::parse(&raw.to_lowercase()).ok_or_else(|| {
        ServiceError::InvalidInput(format!(
            "status must be one of draft, active, paused (got '{}')",
            raw
        ))
    })
}

fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(ServiceError::InvalidInput(format!("'{}' is not a valid email", raw)));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCollection;

    fn service() -> MarketingService {
        MarketingService::new(
            Arc::new(MemoryCollection::new()),
            Arc::new(MemoryCollection::new()),
            Arc::new(MemoryCollection::new()),
            Arc::new(EventBus::new()),
        )
    }

    async fn funnel(service: &MarketingService) -> FunnelDoc {
        service
            .create_funnel(CreateFunnelInput {
                name: "Cloud Launch".into(),
                slug: None,
                description: String::new(),
                stages: vec!["visitor".into(), "trial".into(), "customer".into()],
                active: true,
            })
            .await
            .unwrap()
    }

    fn step(subject: &str, delay_hours: u32) -> SequenceStep {
        SequenceStep {
            subject: subject.into(),
            body_template: "Hi {{name}}".into(),
            delay_hours,
        }
    }

    fn capture(email: &str) -> CaptureLeadInput {
        CaptureLeadInput {
            email: email.into(),
            name: Some("Ada".into()),
            source: None,
            funnel: "cloud-launch".into(),
        }
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(normalize_email(" Ada@Example.COM ").unwrap(), "ada@example.com");
        for bad in ["ada", "@example.com", "ada@example", "ada@.com", "a da@example.com"] {
            assert!(normalize_email(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_schedule_accumulates_delays() {
        let start = Utc::now();
        let plan =
            schedule(&[step("Welcome", 0), step("Tips", 24), step("Offer", 48)], start).unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0].send_at, start);
        assert_eq!(plan[1].send_at, start + Duration::hours(24));
        assert_eq!(plan[2].send_at, start + Duration::hours(72));
        assert_eq!(plan[2].step, 3);
    }

    #[test]
    fn test_schedule_overflow_is_an_error() {
        let err = schedule(&[step("Later", u32::MAX)], chrono::DateTime::<Utc>::MAX_UTC).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_funnel_validation() {
        let service = service();
        let err = service
            .create_funnel(CreateFunnelInput {
                name: "Empty".into(),
                slug: None,
                description: String::new(),
                stages: vec![],
                active: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let f = funnel(&service).await;
        assert_eq!(f.slug, "cloud-launch");
        assert_eq!(f.entry_stage(), Some("visitor"));
    }

    #[tokio::test]
    async fn test_capture_is_idempotent() {
        let service = service();
        let f = funnel(&service).await;

        let (lead, created) = service.capture_lead(capture("Ada@Example.com")).await.unwrap();
        assert!(created);
        assert_eq!(lead.stage, "visitor");
        assert_eq!(lead.email, "ada@example.com");

        let (again, created) = service.capture_lead(capture("ada@example.com")).await.unwrap();
        assert!(!created);
        assert_eq!(again.id, lead.id);

        let leads = service.funnel_leads(&f, None, Page::default()).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert!(service
            .funnel_leads(&f, Some("unknown".into()), Page::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_advance_lead() {
        let service = service();
        let f = funnel(&service).await;
        let (lead, _) = service.capture_lead(capture("ada@example.com")).await.unwrap();
        let id = lead.id.unwrap().to_hex();

        let moved = service.advance_lead(&id, "trial").await.unwrap();
        assert_eq!(moved.stage, "trial");
        assert_eq!(
            service
                .funnel_leads(&f, Some("trial".into()), Page::default())
                .await
                .unwrap()
                .len(),
            1
        );

        assert_eq!(
            service.advance_lead(&id, "churned").await.unwrap_err().code(),
            "INVALID_INPUT"
        );
        assert_eq!(
            service.advance_lead("nope", "trial").await.unwrap_err().code(),
            "LEAD_NOT_FOUND"
        );
    }

    #[tokio::test]
    async fn test_enroll_requires_active_sequence() {
        let service = service();
        funnel(&service).await;
        let (lead, _) = service.capture_lead(capture("ada@example.com")).await.unwrap();
        let id = lead.id.unwrap().to_hex();

        let sequence = service
            .create_sequence(CreateSequenceInput {
                name: "Welcome Series".into(),
                slug: None,
                funnel: Some("cloud-launch".into()),
                steps: vec![step("Welcome", 0), step("Tips", 24)],
            })
            .await
            .unwrap();
        assert_eq!(sequence.status, SequenceStatus::Draft);

        let err = service.enroll_lead(&id, "welcome-series").await.unwrap_err();
        assert_eq!(err.code(), "SEQUENCE_NOT_ACTIVE");

        service.set_sequence_status(sequence, "active").await.unwrap();
        let enrollment = service.enroll_lead(&id, "welcome-series").await.unwrap();
        assert_eq!(enrollment.lead.sequence_slug.as_deref(), Some("welcome-series"));
        assert_eq!(enrollment.schedule.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_sequence_cannot_activate() {
        let service = service();
        let sequence = service
            .create_sequence(CreateSequenceInput {
                name: "Placeholder".into(),
                slug: None,
                funnel: None,
                steps: vec![],
            })
            .await
            .unwrap();
        assert_eq!(
            service
                .set_sequence_status(sequence, "active")
                .await
                .unwrap_err()
                .code(),
            "INVALID_INPUT"
        );

        let err = service
            .create_sequence(CreateSequenceInput {
                name: "Orphan".into(),
                slug: None,
                funnel: Some("missing-funnel".into()),
                steps: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "FUNNEL_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_step_delay_is_bounded() {
        let service = service();
        let err = service
            .create_sequence(CreateSequenceInput {
                name: "Slow Drip".into(),
                slug: None,
                funnel: None,
                steps: vec![step("Welcome", 0), step("Someday", u32::MAX)],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");

        let sequence = service
            .create_sequence(CreateSequenceInput {
                name: "Yearly".into(),
                slug: None,
                funnel: None,
                steps: vec![step("Anniversary", MAX_STEP_DELAY_HOURS)],
            })
            .await
            .unwrap();
        assert_eq!(sequence.steps[0].delay_hours, MAX_STEP_DELAY_HOURS);
    }
}
