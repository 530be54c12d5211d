//! Course catalog routes
//!
//! - GET    /api/v{1,2}/courses
//! - POST   /api/v{1,2}/courses
//! - GET    /api/v{1,2}/courses/{id}
//! - PUT    /api/v{1,2}/courses/{id}
//! - DELETE /api/v{1,2}/courses/{id}
//!
//! `{id}` is resolved by the version's [`IdentifierResolver`](crate::identifier::IdentifierResolver).

use bytes::Bytes;
use hyper::Method;
use serde_json::json;
use tracing::debug;

use crate::identifier::ResourceKind;
use crate::server::AppState;
use crate::services::course_service::{CourseQuery, CreateCourseInput, UpdateCourseInput};

use super::response::{created, ok, present, present_all};
use super::{
    annotate, found_or_response, parse_body, resource_not_found, try_response, try_service,
    ApiVersion, HttpResponse, Query,
};

const KIND: ResourceKind = ResourceKind::Course;

/// Handle `/api/{version}/courses/...`; `None` when no route matches
pub async fn handle_courses(
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
        _ => return None,
    };
    Some(response)
}

async fn list(state: &AppState, query: &Query) -> HttpResponse {
    let course_query = CourseQuery {
        category: query.string("category"),
        level: query.string("level"),
        tag: query.string("tag"),
        published: try_service!(query.bool("published")),
        page: try_service!(query.page()),
    };

    let courses = try_service!(state.services.courses.list(course_query).await);
    debug!(count = courses.len(), "Listed courses");
    ok(
        format!("Found {} courses", courses.len()),
        present_all(&courses),
    )
}

async fn create(state: &AppState, body: &Bytes) -> HttpResponse {
    let input: CreateCourseInput = try_response!(parse_body(body));
    let course = try_service!(state.services.courses.create(input).await);
    created("Course created", present(&course))
}

async fn get(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state
        .services
        .courses
        .resolve(state.resolver(version), id)
        .await;
    let (course, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    annotate(
        ok("Course retrieved", present(&course)),
        matched_by,
        &course.slug,
    )
}

async fn update(state: &AppState, version: ApiVersion, id: &str, body: &Bytes) -> HttpResponse {
    let input: UpdateCourseInput = try_response!(parse_body(body));
    let resolution = state
        .services
        .courses
        .resolve(state.resolver(version), id)
        .await;
    let (course, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    let updated = try_service!(state.services.courses.update(course, input).await);
    annotate(
        ok("Course updated", present(&updated)),
        matched_by,
        &updated.slug,
    )
}

async fn delete(state: &AppState, version: ApiVersion, id: &str) -> HttpResponse {
    let resolution = state
        .services
        .courses
        .resolve(state.resolver(version), id)
        .await;
    let (course, matched_by) = try_response!(found_or_response(KIND, id, resolution));

    if !try_service!(state.services.courses.delete(&course).await) {
        return resource_not_found(KIND, id);
    }
    annotate(
        ok("Course deleted", json!({ "slug": course.slug, "deleted": true })),
        matched_by,
        &course.slug,
    )
}
