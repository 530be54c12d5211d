//! HTTP routes for the academy gateway
//!
//! Each module handles one resource family. Handlers receive the already
//! split path segments after `/api/v{n}/`, the parsed query string and the
//! collected body, and always produce a response.

pub mod bookmarks;
pub mod certificates;
pub mod courses;
pub mod health;
pub mod marketing;
pub mod paths;
pub mod response;

pub use health::{health_check, status_check};
pub use response::{
    error_response, preflight_response, rejection_response, resource_not_found, route_not_found,
    HttpResponse,
};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;

use crate::db::Page;
use crate::identifier::{MatchedBy, Resolution, ResourceKind};
use crate::types::{Result, ServiceError};

/// Default page size for list endpoints
pub const DEFAULT_LIMIT: i64 = 50;

/// Largest page size a client may request
pub const MAX_LIMIT: i64 = 200;

/// API generation a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// `/api/v1`, native IDs still accepted unless strict mode is on
    V1,
    /// `/api/v2`, slugs only
    V2,
}

impl ApiVersion {
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "v1" => Some(Self::V1),
            "v2" => Some(Self::V2),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
        }
    }
}

/// Parsed query string
#[derive(Debug, Clone, Default)]
pub struct Query {
    params: HashMap<String, String>,
}

impl Query {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let params = match raw {
            Some(q) if !q.is_empty() => serde_urlencoded::from_str(q)
                .map_err(|e| ServiceError::InvalidInput(format!("invalid query string: {}", e)))?,
            _ => HashMap::new(),
        };
        Ok(Self { params })
    }

    /// Non-empty parameter value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }

    pub fn bool(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some("true") | Some("1") => Ok(Some(true)),
            Some("false") | Some("0") => Ok(Some(false)),
            Some(other) => Err(ServiceError::InvalidInput(format!(
                "{} must be true or false (got '{}')",
                key, other
            ))),
        }
    }

    /// `limit` and `skip`, defaulting to the first page
    pub fn page(&self) -> Result<Page> {
        let limit = match self.get("limit") {
            None => DEFAULT_LIMIT,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if (1..=MAX_LIMIT).contains(&n) => n,
                _ => {
                    return Err(ServiceError::InvalidInput(format!(
                        "limit must be between 1 and {}",
                        MAX_LIMIT
                    )))
                }
            },
        };
        let skip = match self.get("skip") {
            None => None,
            Some(raw) => Some(raw.parse::<u64>().map_err(|_| {
                ServiceError::InvalidInput("skip must be a non-negative integer".into())
            })?),
        };
        Ok(Page {
            limit: Some(limit),
            skip,
        })
    }
}

/// Deserialize a JSON request body
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> std::result::Result<T, HttpResponse> {
    if body.is_empty() {
        return Err(error_response(&ServiceError::InvalidInput(
            "request body is required".into(),
        )));
    }
    serde_json::from_slice(body).map_err(|e| error_response(&ServiceError::Json(e)))
}

/// Turn a resolver outcome into the resource or the response to send instead
pub fn found_or_response<T>(
    kind: ResourceKind,
    identifier: &str,
    result: Result<Resolution<T>>,
) -> std::result::Result<(T, MatchedBy), HttpResponse> {
    match result {
        Ok(Resolution::Found {
            resource,
            matched_by,
        }) => Ok((resource, matched_by)),
        Ok(Resolution::NotFound) => Err(resource_not_found(kind, identifier)),
        Ok(Resolution::Rejected(rejection)) => {
            Err(rejection_response(kind, identifier, rejection))
        }
        Err(e) => Err(error_response(&e)),
    }
}

/// Flag responses that were served by native ID
pub fn annotate(reply: HttpResponse, matched_by: MatchedBy, slug: &str) -> HttpResponse {
    match matched_by {
        MatchedBy::NativeId => response::mark_deprecated(reply, slug),
        MatchedBy::Slug => reply,
    }
}

/// Unwrap a `Result<T, HttpResponse>` or return the response
macro_rules! try_response {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(response) => return response,
        }
    };
}
pub(crate) use try_response;

/// Unwrap a service `Result` or return its error response
macro_rules! try_service {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return $crate::routes::error_response(&e),
        }
    };
}
pub(crate) use try_service;
