//! Health and status endpoints
//!
//! - /health, /healthz - liveness probe, 200 whenever the process serves requests
//! - /status - resolver policies and counters, storage backend, event plumbing
//!
//! The resolver counters are the migration signal: once `native_id_hits` on
//! v1 stays at zero, the legacy-compatible endpoints can be switched to strict.

use hyper::StatusCode;
use serde::Serialize;

use crate::identifier::ResolutionSnapshot;
use crate::server::AppState;

use super::response::json_response;
use super::{ApiVersion, HttpResponse};

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub timestamp: String,
    /// Storage backend (`mongodb` or `memory`)
    pub store: &'static str,
    #[serde(rename = "devMode")]
    pub dev_mode: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime: u64,
    pub store: &'static str,
    pub resolvers: ResolverStatus,
    pub events: EventStatus,
    #[serde(rename = "courseDirectory")]
    pub course_directory: &'static str,
}

#[derive(Serialize)]
pub struct ResolverStatus {
    pub v1: ResolverReport,
    pub v2: ResolverReport,
}

#[derive(Serialize)]
pub struct ResolverReport {
    pub policy: &'static str,
    pub stats: ResolutionSnapshot,
}

#[derive(Serialize)]
pub struct EventStatus {
    pub subscribers: usize,
    #[serde(rename = "natsConnected")]
    pub nats_connected: bool,
}

/// Liveness probe
pub fn health_check(state: &AppState) -> HttpResponse {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        store: state.services.backend(),
        dev_mode: state.args.dev_mode,
    };
    render(&response)
}

/// Runtime status
pub fn status_check(state: &AppState) -> HttpResponse {
    let report = |version| {
        let resolver = state.resolver(version);
        ResolverReport {
            policy: resolver.policy().name(),
            stats: resolver.stats().snapshot(),
        }
    };

    let response = StatusResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.uptime_secs(),
        store: state.services.backend(),
        resolvers: ResolverStatus {
            v1: report(ApiVersion::V1),
            v2: report(ApiVersion::V2),
        },
        events: EventStatus {
            subscribers: state.services.events.subscriber_count(),
            nats_connected: state.nats_connected,
        },
        course_directory: state.services.certificates.directory_name(),
    };
    render(&response)
}

fn render<T: Serialize>(body: &T) -> HttpResponse {
    match serde_json::to_value(body) {
        Ok(value) => json_response(StatusCode::OK, &value),
        Err(e) => super::error_response(&e.into()),
    }
}
