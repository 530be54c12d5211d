//! Bookmark routes (v1 only)
//!
//! - GET/POST /api/v1/users/{user_id}/bookmarks
//! - DELETE   /api/v1/users/{user_id}/bookmarks/{kind}/{slug}

use bytes::Bytes;
use hyper::Method;
use serde_json::json;

use crate::server::AppState;
use crate::services::bookmark_service::AddBookmarkInput;

use super::response::{created, ok, present, present_all};
use super::{parse_body, try_response, try_service, HttpResponse, Query};

/// Handle `/api/v1/users/{user_id}/bookmarks/...`; `None` when no route matches
pub async fn handle_bookmarks(
    state: &AppState,
    method: &Method,
    user_id: &str,
    rest: &[&str],
    query: &Query,
    body: &Bytes,
) -> Option<HttpResponse> {
    let response = match (method, rest) {
        (&Method::GET, []) => list(state, user_id, query).await,
        (&Method::POST, []) => add(state, user_id, body).await,
        (&Method::DELETE, [kind, slug]) => remove(state, user_id, kind, slug).await,
        _ => return None,
    };
    Some(response)
}

async fn list(state: &AppState, user_id: &str, query: &Query) -> HttpResponse {
    let page = try_service!(query.page());
    let bookmarks = try_service!(
        state
            .services
            .bookmarks
            .list(user_id, query.get("kind"), page)
            .await
    );
    ok(
        format!("Found {} bookmarks", bookmarks.len()),
        present_all(&bookmarks),
    )
}

async fn add(state: &AppState, user_id: &str, body: &Bytes) -> HttpResponse {
    let input: AddBookmarkInput = try_response!(parse_body(body));
    let bookmark = try_service!(state.services.bookmarks.add(user_id, input).await);
    created("Bookmark added", present(&bookmark))
}

async fn remove(state: &AppState, user_id: &str, kind: &str, slug: &str) -> HttpResponse {
    try_service!(state.services.bookmarks.remove(user_id, kind, slug).await);
    ok(
        "Bookmark removed",
        json!({ "kind": kind, "slug": slug, "removed": true }),
    )
}
