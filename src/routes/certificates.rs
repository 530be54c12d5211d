//! Certificate routes (v1 only)
//!
//! - POST /api/v1/certificates
//! - GET  /api/v1/certificates/verify/{code}
//! - POST /api/v1/certificates/{code}/revoke
//! - GET  /api/v1/users/{user_id}/certificates

use bytes::Bytes;
use hyper::Method;
use serde_json::json;

use crate::server::AppState;
use crate::services::certificate_service::IssueCertificateInput;

use super::response::{created, ok, present, present_all};
use super::{parse_body, try_response, try_service, HttpResponse, Query};

/// Handle `/api/v1/certificates/...`; `None` when no route matches
pub async fn handle_certificates(
    state: &AppState,
    method: &Method,
    rest: &[&str],
    body: &Bytes,
) -> Option<HttpResponse> {
    let response = match (method, rest) {
        (&Method::POST, []) => issue(state, body).await,
        (&Method::GET, ["verify", code]) => verify(state, code).await,
        (&Method::POST, [code, "revoke"]) => revoke(state, code).await,
        _ => return None,
    };
    Some(response)
}

async fn issue(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: IssueCertificateInput = try_response!(parse_body(body));
    let certificate = try_service!(state.services.certificates.issue(input).await);
    created("Certificate issued", present(&certificate))
}

async fn verify(state: &AppState, code: &str) -> HttpResponse {
    let (certificate, verification) =
        try_service!(state.services.certificates.verify(code).await);

    let message = if verification.valid {
        "Certificate is valid"
    } else {
        "Certificate has been revoked"
    };
    ok(
        message,
        json!({
            "valid": verification.valid,
            "revoked": verification.revoked,
            "certificate": present(&certificate),
        }),
    )
}

async fn revoke(state: &AppState, code: &str) -> HttpResponse {
    let certificate = try_service!(state.services.certificates.revoke(code).await);
    ok("Certificate revoked", present(&certificate))
}

/// GET /api/v1/users/{user_id}/certificates
pub async fn user_certificates(state: &AppState, user_id: &str, query: &Query) -> HttpResponse {
    let page = try_service!(query.page());
    let certificates = try_service!(
        state
            .services
            .certificates
            .list_for_user(user_id, page)
            .await
    );
    ok(
        format!("Found {} certificates", certificates.len()),
        present_all(&certificates),
    )
}
