//! Marketing routes: funnels, email sequences and leads
//!
//! Funnel and sequence reads by `{id}` exist on both versions; everything
//! else is v1 only.
//!
//! - GET/POST /api/v1/marketing/funnels
//! - GET      /api/v{1,2}/marketing/funnels/{id}
//! - GET      /api/v1/marketing/funnels/{id}/leads
//! - GET/POST /api/v1/marketing/sequences
//! - GET      /api/v{1,2}/marketing/sequences/{id}
//! - POST     /api/v1/marketing/sequences/{id}/status
//! - POST     /api/v1/marketing/leads
//! - POST     /api/v1/marketing/leads/{lead_id}/advance
//! - POST     /api/v1/marketing/leads/{lead_id}/enroll

use bytes::Bytes;
use hyper::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::identifier::ResourceKind;
use crate::server::AppState;
use crate::services::marketing_service::{
    CaptureLeadInput, CreateFunnelInput, CreateSequenceInput,
};

use super::response::{created, ok, present, present_all, success};
use super::{
    annotate, found_or_response, parse_body, try_response, try_service, ApiVersion, HttpResponse,
    Query,
};

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: String,
}

#[derive(Debug, Deserialize)]
struct AdvanceLead {
    stage: String,
}

#[derive(Debug, Deserialize)]
struct EnrollLead {
    /// Sequence slug
    sequence: String,
}

/// Handle `/api/{version}/marketing/...`; `None` when no route matches
pub async fn handle_marketing(
    state: &AppState,
    version: ApiVersion,
    method: &Method,
    rest: &[&str],
    query: &Query,
    body: &Bytes,
) -> Option<HttpResponse> {
    // Reads by identifier are shared between versions
    match (method, rest) {
        (&Method::GET, ["funnels", id]) => return Some(get_funnel(state, version, id).await),
        (&Method::GET, ["sequences", id]) => return Some(get_sequence(state, version, id).await),
        _ => {}
    }

    if version != ApiVersion::V1 {
        return None;
    }

    let response = match (method, rest) {
        (&Method::GET, ["funnels"]) => list_funnels(state, query).await,
        (&Method::POST, ["funnels"]) => create_funnel(state, body).await,
        (&Method::GET, ["funnels", id, "leads"]) => funnel_leads(state, id, query).await,
        (&Method::GET, ["sequences"]) => list_sequences(state, query).await,
        (&Method::POST, ["sequences"]) => create_sequence(state, body).await,
        (&Method::POST, ["sequences", id, "status"]) => set_status(state, id, body).await,
        (&Method::POST, ["leads"]) => capture_lead(state, body).await,
        (&Method::POST, ["leads", lead_id, "advance"]) => advance_lead(state, lead_id, body).await,
        (&Method::POST, ["leads", lead_id, "enroll"]) => enroll_lead(state, lead_id, body).await,
        _ => return None,
    };
    Some(response)
}

// ============================================================================
// Funnels
// ============================================================================

async fn list_funnels(state: &AppState, query: &Query) -> HttpResponse {
    let active = try_service!(query.bool("active"));
    let page = try_service!(query.page());
    let funnels = try_service!(state.services.marketing.list_funnels(active, page).await);
    ok(format!("Found {} funnels", funnels.len()), present_all(&funnels))
}

async fn create_funnel(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: CreateFunnelInput = try_response!(parse_body(body));
    let funnel = try_service!(state.services.marketing.create_funnel(input).await);
    created("Funnel created", present(&funnel))
}

async fn get_funnel(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state
        .services
        .marketing
        .resolve_funnel(state.resolver(version), id)
        .await;
    let (funnel, matched_by) =
        try_response!(found_or_response(ResourceKind::Funnel, id, resolution));

    annotate(
        ok("Funnel retrieved", present(&funnel)),
        matched_by,
        &funnel.slug,
    )
}

async fn funnel_leads(state: &AppState, id: &str, query: &Query) -> HttpResponse {
    let page = try_service!(query.page());
    let resolution = state
        .services
        .marketing
        .resolve_funnel(state.resolver(ApiVersion::V1), id)
        .await;
    let (funnel, matched_by) =
        try_response!(found_or_response(ResourceKind::Funnel, id, resolution));

    let leads = try_service!(
        state
            .services
            .marketing
            .funnel_leads(&funnel, query.string("stage"), page)
            .await
    );
    annotate(
        ok(
            format!("Found {} leads in '{}'", leads.len(), funnel.slug),
            present_all(&leads),
        ),
        matched_by,
        &funnel.slug,
    )
}

// ============================================================================
// Email sequences
// ============================================================================

async fn list_sequences(state: &AppState, query: &Query) -> HttpResponse {
    let page = try_service!(query.page());
    let sequences = try_service!(
        state
            .services
            .marketing
            .list_sequences(query.string("funnel"), query.get("status"), page)
            .await
    );
    ok(
        format!("Found {} email sequences", sequences.len()),
        present_all(&sequences),
    )
}

async fn create_sequence(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: CreateSequenceInput = try_response!(parse_body(body));
    let sequence = try_service!(state.services.marketing.create_sequence(input).await);
    created("Email sequence created", present(&sequence))
}

async fn get_sequence(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state
        .services
        .marketing
        .resolve_sequence(state.resolver(version), id)
        .await;
    let (sequence, matched_by) =
        try_response!(found_or_response(ResourceKind::EmailSequence, id, resolution));

    annotate(
        ok("Email sequence retrieved", present(&sequence)),
        matched_by,
        &sequence.slug,
    )
}

async fn set_status(state: &AppState, id: &str, body: &Bytes) -> HttpResponse {
    let change: StatusChange = try_response!(parse_body(body));
    let resolution = state
        .services
        .marketing
        .resolve_sequence(state.resolver(ApiVersion::V1), id)
        .await;
    let (sequence, matched_by) =
        try_response!(found_or_response(ResourceKind::EmailSequence, id, resolution));

    let updated = try_service!(
        state
            .services
            .marketing
            .set_sequence_status(sequence, &change.status)
            .await
    );
    annotate(
        ok(
            format!("Email sequence is {}", updated.status.as_str()),
            present(&updated),
        ),
        matched_by,
        &updated.slug,
    )
}

// ============================================================================
// Leads
// ============================================================================

async fn capture_lead(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: CaptureLeadInput = try_response!(parse_body(body));
    let (lead, is_new) = try_service!(state.services.marketing.capture_lead(input).await);

    if is_new {
        created("Lead captured", present(&lead))
    } else {
        success(StatusCode::OK, "Lead already captured", present(&lead))
    }
}

async fn advance_lead(state: &AppState, lead_id: &str, body: &Bytes) -> HttpResponse {
    let advance: AdvanceLead = try_response!(parse_body(body));
    let lead = try_service!(
        state
            .services
            .marketing
            .advance_lead(lead_id, advance.stage.trim())
            .await
    );
    ok(format!("Lead moved to '{}'", lead.stage), present(&lead))
}

async fn enroll_lead(state: &AppState, lead_id: &str, body: &Bytes) -> HttpResponse {
    let enroll: EnrollLead = try_response!(parse_body(body));
    let enrollment = try_service!(
        state
            .services
            .marketing
            .enroll_lead(lead_id, enroll.sequence.trim())
            .await
    );

    ok(
        format!("Lead enrolled with {} scheduled emails", enrollment.schedule.len()),
        json!({
            "lead": present(&enrollment.lead),
            "schedule": enrollment.schedule,
        }),
    )
}
