//! HTTP response building helpers
//!
//! Every JSON response uses one envelope:
//!
//! ```json
//! { "success": true,  "message": "...", "data": { ... } }
//! { "success": false, "message": "...", "error": { "code": "...", "details": "...", ...context } }
//! ```
//!
//! Documents are rendered from BSON: ObjectIds become hex strings, dates
//! become RFC 3339, and `_id` is exposed as `id`.

use bson::{Bson, Document};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::error;

use crate::identifier::{LegacyShape, Rejection, ResourceKind, EXPECTED_FORMAT};
use crate::types::ServiceError;

/// Response type produced by every handler
pub type HttpResponse = Response<Full<Bytes>>;

fn with_cors(mut response: HttpResponse) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}

/// Build a JSON response with the given status code
pub fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    with_cors(response)
}

/// Successful envelope
pub fn success(status: StatusCode, message: impl Into<String>, data: Value) -> HttpResponse {
    json_response(
        status,
        &json!({
            "success": true,
            "message": message.into(),
            "data": data,
        }),
    )
}

pub fn ok(message: impl Into<String>, data: Value) -> HttpResponse {
    success(StatusCode::OK, message, data)
}

pub fn created(message: impl Into<String>, data: Value) -> HttpResponse {
    success(StatusCode::CREATED, message, data)
}

/// Failure envelope; `context` entries are merged into the `error` object
pub fn failure(
    status: StatusCode,
    message: &str,
    code: &str,
    details: &str,
    context: Map<String, Value>,
) -> HttpResponse {
    let mut error = Map::new();
    error.insert("code".into(), Value::from(code));
    error.insert("details".into(), Value::from(details));
    error.extend(context);

    json_response(
        status,
        &json!({
            "success": false,
            "message": message,
            "error": Value::Object(error),
        }),
    )
}

/// Convert a ServiceError to an appropriate HTTP response
pub fn error_response(err: &ServiceError) -> HttpResponse {
    let (status, message) = match err {
        ServiceError::NotFound { .. } => (StatusCode::NOT_FOUND, "Resource not found"),
        ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        ServiceError::InvalidSlug(_) => (StatusCode::BAD_REQUEST, "Invalid slug"),
        ServiceError::Conflict { .. } => (StatusCode::CONFLICT, "Conflict"),
        ServiceError::Json(_) => (StatusCode::BAD_REQUEST, "Invalid JSON body"),
        ServiceError::Database(_) => (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable"),
        ServiceError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream service failed"),
        ServiceError::Nats(_)
        | ServiceError::Io(_)
        | ServiceError::Config(_)
        | ServiceError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };

    if status.is_server_error() {
        error!(code = err.code(), error = %err, "Request failed");
    }

    let details = match err {
        // Internal failure text stays in the logs
        ServiceError::Io(_) | ServiceError::Config(_) | ServiceError::Internal(_) => {
            "An unexpected error occurred".to_string()
        }
        _ => err.to_string(),
    };

    failure(status, message, err.code(), &details, Map::new())
}

/// Response for an identifier refused without lookup
pub fn rejection_response(kind: ResourceKind, identifier: &str, rejection: Rejection) -> HttpResponse {
    let mut context = Map::new();
    context.insert("identifier".into(), Value::from(identifier));

    match rejection {
        Rejection::Legacy(shape) => {
            context.insert("hint".into(), Value::from(legacy_hint(kind, shape)));
            failure(
                StatusCode::GONE,
                "Legacy identifiers are no longer supported",
                "LEGACY_ID_NOT_SUPPORTED",
                &format!(
                    "'{}' looks like a legacy {} identifier",
                    identifier,
                    shape.as_str()
                ),
                context,
            )
        }
        Rejection::Malformed => {
            context.insert("expectedFormat".into(), Value::from(EXPECTED_FORMAT));
            failure(
                StatusCode::BAD_REQUEST,
                "Invalid identifier format",
                "INVALID_SLUG_FORMAT",
                &format!("'{}' is not a valid {} slug", identifier, kind.as_str()),
                context,
            )
        }
    }
}

fn legacy_hint(kind: ResourceKind, shape: LegacyShape) -> String {
    let noun = kind.label().to_lowercase();
    match shape {
        LegacyShape::NativeId => format!(
            "Address the {} by its slug instead of its database ID, e.g. /{}/aws-fundamentals. \
             The slug is returned in the 'slug' field of every {} response.",
            noun,
            collection_segment(kind),
            noun
        ),
        LegacyShape::Uuid | LegacyShape::OpaqueToken => format!(
            "Identifiers from the previous addressing scheme were retired. Look the {} up by its slug.",
            noun
        ),
    }
}

fn collection_segment(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Course => "courses",
        ResourceKind::LearningPath => "paths",
        ResourceKind::Funnel => "marketing/funnels",
        ResourceKind::EmailSequence => "marketing/sequences",
    }
}

/// 404 for a well-formed identifier that matched nothing
pub fn resource_not_found(kind: ResourceKind, identifier: &str) -> HttpResponse {
    let mut context = Map::new();
    context.insert("identifier".into(), Value::from(identifier));
    failure(
        StatusCode::NOT_FOUND,
        &format!("{} not found", kind.label()),
        kind.not_found_code(),
        &format!("No {} matches '{}'", kind.label().to_lowercase(), identifier),
        context,
    )
}

/// 404 for paths no route handles
pub fn route_not_found(method: &str, path: &str) -> HttpResponse {
    let mut context = Map::new();
    context.insert("path".into(), Value::from(path));
    failure(
        StatusCode::NOT_FOUND,
        "Not found",
        "ROUTE_NOT_FOUND",
        &format!("No route for {} {}", method, path),
        context,
    )
}

/// CORS preflight response
pub fn preflight_response() -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    with_cors(response)
}

/// Mark a response as served through a deprecated addressing scheme
pub fn mark_deprecated(mut response: HttpResponse, slug: &str) -> HttpResponse {
    let headers = response.headers_mut();
    headers.insert(
        HeaderName::from_static("deprecation"),
        HeaderValue::from_static("true"),
    );
    if let Ok(value) = HeaderValue::from_str(slug) {
        headers.insert(HeaderName::from_static("x-canonical-slug"), value);
    }
    response
}

// ============================================================================
// Document presentation
// ============================================================================

/// Render a stored document as API JSON
pub fn present<T: Serialize>(doc: &T) -> Value {
    match bson::to_bson(doc) {
        Ok(Bson::Document(d)) => present_document(d),
        Ok(other) => bson_to_json(other),
        Err(e) => {
            error!(error = %e, "Failed to render document");
            Value::Null
        }
    }
}

pub fn present_all<T: Serialize>(docs: &[T]) -> Value {
    Value::Array(docs.iter().map(present).collect())
}

fn present_document(mut doc: Document) -> Value {
    let mut out = Map::new();

    if let Some(id) = doc.remove("_id") {
        out.insert("id".into(), bson_to_json(id));
    }

    // Timestamps are surfaced; the deletion flag never is, reads only see live documents
    if let Some(Bson::Document(metadata)) = doc.remove("metadata") {
        for key in ["created_at", "updated_at"] {
            if let Some(value) = metadata.get(key) {
                out.insert(key.into(), bson_to_json(value.clone()));
            }
        }
    }

    for (key, value) in doc {
        out.insert(key, bson_to_json(value));
    }
    Value::Object(out)
}

/// Convert BSON to plain JSON
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::from(oid.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::from)
            .unwrap_or_else(|_| Value::from(dt.timestamp_millis())),
        Bson::String(s) => Value::from(s),
        Bson::Boolean(b) => Value::from(b),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Double(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(k, v)| (k, bson_to_json(v)))
                .collect(),
        ),
        other => other.into_relaxed_extjson(),
    }
}
