//! Event system for catalog operations
//!
//! Services emit [`CatalogEvent`]s on an in-process broadcast bus. Listeners
//! log them and, when NATS is connected, forward them as JSON to
//! `{prefix}.{event_name}`.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::nats::NatsClient;

/// Catalog events emitted by services
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    // Course events
    CourseCreated {
        id: String,
        slug: String,
        title: String,
    },
    CourseUpdated {
        id: String,
        slug: String,
    },
    CourseDeleted {
        id: String,
        slug: String,
    },

    // Path events
    PathCreated {
        id: String,
        slug: String,
        title: String,
    },
    PathUpdated {
        id: String,
        slug: String,
    },
    PathDeleted {
        id: String,
        slug: String,
    },

    // Certificate events
    CertificateIssued {
        user_id: String,
        course_slug: String,
        verification_code: String,
    },
    CertificateRevoked {
        verification_code: String,
    },

    // Bookmark events
    BookmarkAdded {
        user_id: String,
        kind: String,
        slug: String,
    },
    BookmarkRemoved {
        user_id: String,
        kind: String,
        slug: String,
    },

    // Marketing events
    FunnelCreated {
        slug: String,
        name: String,
    },
    SequenceCreated {
        slug: String,
        name: String,
    },
    SequenceStatusChanged {
        slug: String,
        status: String,
    },
    LeadCaptured {
        lead_id: String,
        funnel_slug: String,
        stage: String,
    },
    LeadAdvanced {
        lead_id: String,
        from_stage: String,
        to_stage: String,
    },
    LeadEnrolled {
        lead_id: String,
        sequence_slug: String,
    },
}

impl CatalogEvent {
    /// Snake-case event name, used as the NATS subject suffix
    pub fn name(&self) -> &'static str {
        match self {
            Self::CourseCreated { .. } => "course_created",
            Self::CourseUpdated { .. } => "course_updated",
            Self::CourseDeleted { .. } => "course_deleted",
            Self::PathCreated { .. } => "path_created",
            Self::PathUpdated { .. } => "path_updated",
            Self::PathDeleted { .. } => "path_deleted",
            Self::CertificateIssued { .. } => "certificate_issued",
            Self::CertificateRevoked { .. } => "certificate_revoked",
            Self::BookmarkAdded { .. } => "bookmark_added",
            Self::BookmarkRemoved { .. } => "bookmark_removed",
            Self::FunnelCreated { .. } => "funnel_created",
            Self::SequenceCreated { .. } => "sequence_created",
            Self::SequenceStatusChanged { .. } => "sequence_status_changed",
            Self::LeadCaptured { .. } => "lead_captured",
            Self::LeadAdvanced { .. } => "lead_advanced",
            Self::LeadEnrolled { .. } => "lead_enrolled",
        }
    }

    /// NATS subject for this event under the given prefix
    pub fn subject(&self, prefix: &str) -> String {
        format!("{}.{}", prefix, self.name())
    }
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &CatalogEvent);
}

/// Event bus for broadcasting catalog events
pub struct EventBus {
    sender: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: CatalogEvent) {
        trace!(event = ?event, "Emitting catalog event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &CatalogEvent) {
        match event {
            CatalogEvent::CourseCreated { id, slug, title } => {
                info!(id = %id, slug = %slug, title = %title, "Course created");
            }
            CatalogEvent::CourseDeleted { id, slug } => {
                info!(id = %id, slug = %slug, "Course deleted");
            }
            CatalogEvent::PathCreated { id, slug, title } => {
                info!(id = %id, slug = %slug, title = %title, "Path created");
            }
            CatalogEvent::CertificateIssued {
                user_id,
                course_slug,
                verification_code,
            } => {
                info!(
                    user_id = %user_id,
                    course = %course_slug,
                    code = %verification_code,
                    "Certificate issued"
                );
            }
            CatalogEvent::LeadCaptured {
                lead_id,
                funnel_slug,
                stage,
            } => {
                debug!(lead_id = %lead_id, funnel = %funnel_slug, stage = %stage, "Lead captured");
            }
            _ => {
                debug!(event = event.name(), "Catalog event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

/// Spawn a background task that publishes every event to NATS
///
/// Publish failures are logged and dropped; they never reach the request
/// that emitted the event.
pub fn spawn_nats_forwarder(
    event_bus: Arc<EventBus>,
    nats: NatsClient,
    prefix: String,
) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();

    tokio::spawn(async move {
        info!(client = nats.name(), prefix = %prefix, "Forwarding catalog events to NATS");
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let subject = event.subject(&prefix);
                    if let Err(e) = nats.publish_json(&subject, &event).await {
                        warn!(subject = %subject, error = %e, "Failed to forward event");
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "NATS forwarder lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    if let Err(e) = nats.flush().await {
                        warn!(error = %e, "Failed to flush NATS on shutdown");
                    }
                    debug!("Event bus closed, stopping NATS forwarder");
                    break;
                }
            }
        }
    })
}
