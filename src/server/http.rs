//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo, one task per connection. Requests are
//! routed by [`dispatch`], which is independent of the transport so tests can
//! drive it directly.

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::header::HeaderValue;
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Map;
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Args;
use crate::identifier::{IdentifierResolver, ResolverPolicy};
use crate::routes::{self, response::failure, ApiVersion, HttpResponse, Query};
use crate::services::Services;
use crate::types::{Result, ServiceError};

/// Largest request body accepted
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub services: Services,
    /// Resolver for `/api/v1`, legacy-compatible unless strict mode is on
    v1: IdentifierResolver,
    /// Resolver for `/api/v2`, always strict
    v2: IdentifierResolver,
    pub started_at: Instant,
    pub nats_connected: bool,
}

impl AppState {
    pub fn new(args: Args, services: Services) -> Self {
        Self {
            v1: IdentifierResolver::with_policy(args.v1_policy()),
            v2: IdentifierResolver::with_policy(ResolverPolicy::STRICT),
            args,
            services,
            started_at: Instant::now(),
            nats_connected: false,
        }
    }

    /// Record whether catalog events are forwarded to NATS
    pub fn with_nats(mut self, connected: bool) -> Self {
        self.nats_connected = connected;
        self
    }

    /// Resolver for an API generation
    pub fn resolver(&self, version: ApiVersion) -> &IdentifierResolver {
        match version {
            ApiVersion::V1 => &self.v1,
            ApiVersion::V2 => &self.v2,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Accept connections until the listener fails to bind
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        listen = %state.args.listen,
        store = state.services.backend(),
        "Academy listening"
    );
    info!(
        v1 = state.resolver(ApiVersion::V1).policy().name(),
        v2 = state.resolver(ApiVersion::V2).policy().name(),
        "Identifier resolution policies"
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - storage and messaging failures are tolerated");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<HttpResponse, Infallible> {
    let request_id = Uuid::new_v4();
    let span = info_span!("request", id = %request_id);

    let mut response = handle_with_body(&state, addr, req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert("x-request-id", value);
    }
    Ok(response)
}

async fn handle_with_body(state: &AppState, addr: SocketAddr, req: Request<Incoming>) -> HttpResponse {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);

    info!("[{}] {} {}", addr, method, path);

    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return body_error_response(e.as_ref());
        }
    };

    let response = dispatch(state, &method, &path, query.as_deref(), body).await;
    debug!(status = response.status().as_u16(), "[{}] {} {}", addr, method, path);
    response
}

/// 413 when the body exceeded the limit, 400 for any other read failure
fn body_error_response(err: &(dyn std::error::Error + Send + Sync + 'static)) -> HttpResponse {
    if err.is::<LengthLimitError>() {
        return failure(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body rejected",
            "BODY_TOO_LARGE",
            &format!("Request bodies are limited to {} bytes", MAX_BODY_BYTES),
            Map::new(),
        );
    }
    failure(
        StatusCode::BAD_REQUEST,
        "Request body rejected",
        "INVALID_BODY",
        &format!("Failed to read request body: {}", err),
        Map::new(),
    )
}

/// Route a request to its handler
pub async fn dispatch(
    state: &AppState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    body: Bytes,
) -> HttpResponse {
    match (method, path) {
        // Liveness probe
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            return routes::health_check(state)
        }

        // Resolver counters and runtime wiring
        (&Method::GET, "/status") => return routes::status_check(state),

        // CORS preflight
        (&Method::OPTIONS, _) => return routes::preflight_response(),

        _ => {}
    }

    let decoded = match decode_segments(path) {
        Ok(segments) => segments,
        Err(e) => return routes::error_response(&e),
    };
    let segments: Vec<&str> = decoded.iter().map(|s| s.as_ref()).collect();

    let response = match segments.as_slice() {
        ["api", version, rest @ ..] => match ApiVersion::parse(version) {
            Some(version) => {
                let query = match Query::parse(query) {
                    Ok(q) => q,
                    Err(e) => return routes::error_response(&e),
                };
                route_api(state, version, method, rest, &query, &body).await
            }
            None => None,
        },
        _ => None,
    };

    response.unwrap_or_else(|| routes::route_not_found(method.as_str(), path))
}

async fn route_api(
    state: &AppState,
    version: ApiVersion,
    method: &Method,
    segments: &[&str],
    query: &Query,
    body: &Bytes,
) -> Option<HttpResponse> {
    use routes::{bookmarks, certificates, courses, marketing, paths};

    match (version, segments) {
        (_, ["courses", rest @ ..]) => {
            courses::handle_courses(state, version, method, rest, query, body).await
        }
        (_, ["paths", rest @ ..]) => {
            paths::handle_paths(state, version, method, rest, query, body).await
        }
        (_, ["marketing", rest @ ..]) => {
            marketing::handle_marketing(state, version, method, rest, query, body).await
        }

        // Certificates and per-user resources are v1 only
        (ApiVersion::V1, ["certificates", rest @ ..]) => {
            certificates::handle_certificates(state, method, rest, body).await
        }
        (ApiVersion::V1, ["users", user_id, "certificates"]) if *method == Method::GET => {
            Some(certificates::user_certificates(state, user_id, query).await)
        }
        (ApiVersion::V1, ["users", user_id, "bookmarks", rest @ ..]) => {
            bookmarks::handle_bookmarks(state, method, user_id, rest, query, body).await
        }

        _ => None,
    }
}

/// Split a path into percent-decoded, non-empty segments
fn decode_segments(path: &str) -> Result<Vec<Cow<'_, str>>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| {
            urlencoding::decode(segment).map_err(|_| {
                ServiceError::InvalidInput(format!("path segment '{}' is not valid UTF-8", segment))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{Full, StreamBody};
    use hyper::body::Frame;

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let body = Full::new(Bytes::from(vec![b'x'; 16]));
        let err = Limited::new(body, 8).collect().await.unwrap_err();
        let response = body_error_response(err.as_ref());
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_broken_body_is_400() {
        let frames = futures_util::stream::iter(vec![Err::<Frame<Bytes>, _>(
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away"),
        )]);
        let err = Limited::new(StreamBody::new(frames), MAX_BODY_BYTES)
            .collect()
            .await
            .unwrap_err();
        let response = body_error_response(err.as_ref());
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_decode_segments() {
        let segments = decode_segments("/api/v2/courses/aws%20fundamentals/").unwrap();
        assert_eq!(segments, vec!["api", "v2", "courses", "aws fundamentals"]);

        assert!(decode_segments("/api/v2/courses/%FF").is_err());
        assert!(decode_segments("/").unwrap().is_empty());
    }

    #[test]
    fn test_version_parse() {
        assert_eq!(ApiVersion::parse("v1"), Some(ApiVersion::V1));
        assert_eq!(ApiVersion::parse("v2"), Some(ApiVersion::V2));
        assert_eq!(ApiVersion::parse("v3"), None);
    }
}
