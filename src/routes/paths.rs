//! Learning path routes
//!
//! - GET/POST          /api/v{1,2}/paths
//! - GET/PUT/DELETE    /api/v{1,2}/paths/{id}
//! - GET               /api/v{1,2}/paths/{id}/courses

use bytes::Bytes;
use hyper::Method;
use serde_json::json;

use crate::identifier::ResourceKind;
use crate::server::AppState;
use crate::services::path_service::{CreatePathInput, UpdatePathInput};

use super::response::{created, ok, present, present_all};
use super::{
    annotate, found_or_response, parse_body, resource_not_found, try_response, try_service,
    ApiVersion, HttpResponse, Query,
};

const KIND: ResourceKind = ResourceKind::LearningPath;

/// Handle `/api/{version}/paths/...`; `None` when no route matches
pub async fn handle_paths(
    state: &AppState,
    version: ApiVersion,
    method: &Method,
    rest: &[&str],
    query: &Query,
    body: &Bytes,
) -> Option<HttpResponse> {
    let response = match (method, rest) {
        (&Method::GET, []) => list(state, query).await,
        (&Method::POST, []) => create(state, body).await,
        (&Method::GET, [id]) => get(state, version, id).await,
        (&Method::PUT, [id]) => update(state, version, id, body).await,
        (&Method::DELETE, [id]) => delete(state, version, id).await,
        (&Method::GET, [id, "courses"]) => courses(state, version, id).await,
        _ => return None,
    };
    Some(response)
}

async fn list(state: &AppState, query: &Query) -> HttpResponse {
    let published = try_service!(query.bool("published"));
    let page = try_service!(query.page());

    let paths = try_service!(
        state
            .services
            .paths
            .list(query.string("course"), published, page)
            .await
    );
    ok(format!("Found {} learning paths", paths.len()), present_all(&paths))
}

async fn create(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: CreatePathInput = try_response!(parse_body(body));
    let path = try_service!(state.services.paths.create(input).await);
    created("Learning path created", present(&path))
}

async fn get(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state.services.paths.resolve(state.resolver(version), id).await;
    let (path, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    annotate(
        ok("Learning path retrieved", present(&path)),
        matched_by,
        &path.slug,
    )
}

async fn update(state: &AppState, version: ApiVersion, id: &str, body: &Bytes) -> HttpResponse {
    let input: UpdatePathInput = try_response!(parse_body(body));
    let resolution = state.services.paths.resolve(state.resolver(version), id).await;
    let (path, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    let updated = try_service!(state.services.paths.update(path, input).await);
    annotate(
        ok("Learning path updated", present(&updated)),
        matched_by,
        &updated.slug,
    )
}

async fn delete(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state.services.paths.resolve(state.resolver(version), id).await;
    let (path, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    if !try_service!(state.services.paths.delete(&path).await) {
        return resource_not_found(KIND, id);
    }
    annotate(
        ok("Learning path deleted", json!({ "slug": path.slug, "deleted": true })),
        matched_by,
        &path.slug,
    )
}

/// The path's courses in order; dangling references are reported, not fatal
async fn courses(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state.services.paths.resolve(state.resolver(version), id).await;
    let (path, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    let listing = try_service!(state.services.paths.courses_of(&path).await);
    annotate(
        ok(
            format!("Found {} courses in '{}'", listing.courses.len(), path.slug),
            json!({
                "path": path.slug,
                "courses": present_all(&listing.courses),
                "missing": listing.missing,
            }),
        ),
        matched_by,
        &path.slug,
    )
}
