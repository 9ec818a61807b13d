//! HTTP server mapping object paths onto the cache engine
//!
//! Provides /health plus one wildcard GET route: the first path segment is
//! the bucket, the rest is the object key.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use larder_cache::{CacheEngine, FetchedObject, RangeSpec};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::ApiError;

/// Shared state for the HTTP server
pub struct ServerState {
    pub engine: CacheEngine,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(engine: CacheEngine) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    cache: larder_cache::CacheStats,
}

/// Create the HTTP router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/", get(missing_object_path))
        .route("/{*path}", get(get_object))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(state: SharedState, port: u16) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

/// Health check endpoint
async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cache: state.engine.stats(),
    })
}

/// A bare `/` names neither bucket nor key
async fn missing_object_path() -> ApiError {
    ApiError::BadRequest("bucket and key are required".to_string())
}

/// Serve an object, or a slice of it when the request carries a Range header
async fn get_object(
    State(state): State<SharedState>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (bucket, key) = split_object_path(&path)?;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(parse_range_header)
        .unwrap_or_default();

    let object = state.engine.get_with_range(bucket, key, range).await?;
    Ok(object_response(object))
}

/// Split a wildcard capture into `(bucket, key)`: first segment is the
/// bucket, the remainder is the key and may itself contain slashes.
fn split_object_path(path: &str) -> Result<(&str, &str), ApiError> {
    let path = path.trim_start_matches('/');
    let (bucket, key) = path
        .split_once('/')
        .ok_or_else(|| ApiError::BadRequest("bucket and key are required".to_string()))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(ApiError::BadRequest("bucket and key are required".to_string()));
    }
    // Keys become filesystem paths under the cache root, so segments that
    // would escape or alias another path are refused outright
    if !is_clean_segment(bucket) || !key.split('/').all(is_clean_segment) {
        return Err(ApiError::BadRequest("invalid bucket or key".to_string()));
    }
    Ok((bucket, key))
}

fn is_clean_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

/// Parse `bytes=<start>-<end>` with either bound optional. Anything
/// malformed leaves the corresponding bound unset, and a value that is not
/// a single range is ignored entirely, falling back to the whole object.
fn parse_range_header(value: &str) -> RangeSpec {
    let Some(spec) = value.strip_prefix("bytes=") else {
        return RangeSpec::full();
    };
    let parts: Vec<&str> = spec.split('-').collect();
    if parts.len() != 2 {
        return RangeSpec::full();
    }
    RangeSpec {
        start: parts[0].parse().ok(),
        end: parts[1].parse().ok(),
    }
}

fn object_response(object: FetchedObject) -> Response {
    let cache_header = if object.from_cache { "HIT" } else { "MISS" };

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, object.content_type.as_str())
        .header(header::ACCEPT_RANGES, "bytes")
        .header("X-Cache", cache_header);

    if object.is_partial {
        builder = builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", object.start, object.end, object.total_size),
            )
            .header(header::CONTENT_LENGTH, object.data.len());
    } else {
        builder = builder.status(StatusCode::OK);
    }

    builder
        .body(Body::from(object.data))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::Request;
    use bytes::Bytes;
    use larder_cache::{CacheError, CacheResult, Origin, OriginObject, StatStore};
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct FixtureOrigin {
        objects: HashMap<(String, String), (Bytes, String)>,
    }

    impl FixtureOrigin {
        fn new() -> Self {
            Self {
                objects: HashMap::new(),
            }
        }

        fn with(mut self, bucket: &str, key: &str, data: &[u8], content_type: &str) -> Self {
            self.objects.insert(
                (bucket.to_string(), key.to_string()),
                (Bytes::copy_from_slice(data), content_type.to_string()),
            );
            self
        }
    }

    #[async_trait]
    impl Origin for FixtureOrigin {
        async fn fetch(
            &self,
            bucket: &str,
            key: &str,
            range: RangeSpec,
        ) -> CacheResult<OriginObject> {
            let (data, content_type) = self
                .objects
                .get(&(bucket.to_string(), key.to_string()))
                .ok_or_else(|| CacheError::Origin {
                    context: format!("{}/{}", bucket, key),
                    source: "no such object".into(),
                })?;
            let total_size = data.len() as u64;
            if range.is_full() {
                return Ok(OriginObject {
                    data: data.clone(),
                    content_type: content_type.clone(),
                    total_size,
                });
            }
            let (start, end) = range.resolve(total_size)?;
            Ok(OriginObject {
                data: data.slice(start as usize..(end + 1) as usize),
                content_type: content_type.clone(),
                total_size,
            })
        }
    }

    async fn create_test_state(dir: &TempDir, origin: FixtureOrigin) -> SharedState {
        let store = StatStore::connect(dir.path().join("stat.db")).await.unwrap();
        let engine = CacheEngine::new(store, Arc::new(origin), dir.path().join("cache"));
        Arc::new(ServerState::new(engine))
    }

    fn hello_origin() -> FixtureOrigin {
        FixtureOrigin::new().with("assets", "a.txt", b"hello world", "text/plain")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, FixtureOrigin::new()).await;
        let router = create_router(state);

        let response = router
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].as_u64().is_some());
        assert_eq!(json["cache"]["hits"], 0);
        assert_eq!(json["cache"]["misses"], 0);
    }

    #[tokio::test]
    async fn test_full_object_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, hello_origin()).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/assets/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(response.headers()["accept-ranges"], "bytes");
        assert_eq!(response.headers()["x-cache"], "MISS");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello world");

        // Second request is served from the populated cache
        let response = router
            .oneshot(Request::builder().uri("/assets/a.txt").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-cache"], "HIT");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_range_request() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, hello_origin()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/a.txt")
                    .header(header::RANGE, "bytes=0-4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 0-4/11");
        assert_eq!(response.headers()["content-length"], "5");
        assert_eq!(response.headers()["x-cache"], "MISS");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello");
    }

    #[tokio::test]
    async fn test_open_ended_range_request() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, hello_origin()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/a.txt")
                    .header(header::RANGE, "bytes=6-")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()["content-range"], "bytes 6-10/11");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"world");
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_is_400() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, hello_origin()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/a.txt")
                    .header(header::RANGE, "bytes=9-2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_range_serves_whole_object() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, hello_origin()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/a.txt")
                    .header(header::RANGE, "bytes=1-2-3")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_missing_key_is_400() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, FixtureOrigin::new()).await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/assets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_traversal_segments_are_rejected() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, FixtureOrigin::new()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/../secrets.txt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_origin_failure_is_500() {
        let dir = TempDir::new().unwrap();
        let state = create_test_state(&dir, FixtureOrigin::new()).await;
        let router = create_router(state);

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/assets/missing.bin")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn test_split_object_path() {
        assert_eq!(split_object_path("assets/a.txt").unwrap(), ("assets", "a.txt"));
        assert_eq!(
            split_object_path("assets/img/deep/logo.png").unwrap(),
            ("assets", "img/deep/logo.png")
        );
        assert!(split_object_path("assets").is_err());
        assert!(split_object_path("assets/").is_err());
        assert!(split_object_path("/a.txt").is_err());
        assert!(split_object_path("assets/../a.txt").is_err());
        assert!(split_object_path("../assets/a.txt").is_err());
        assert!(split_object_path("assets/img//logo.png").is_err());
    }

    #[test]
    fn test_parse_range_header() {
        assert_eq!(
            parse_range_header("bytes=0-99"),
            RangeSpec { start: Some(0), end: Some(99) }
        );
        assert_eq!(
            parse_range_header("bytes=10-"),
            RangeSpec { start: Some(10), end: None }
        );
        assert_eq!(
            parse_range_header("bytes=-99"),
            RangeSpec { start: None, end: Some(99) }
        );
        assert_eq!(parse_range_header("bytes=-"), RangeSpec::full());
        assert_eq!(parse_range_header("bytes=1-2-3"), RangeSpec::full());
        assert_eq!(parse_range_header("items=0-99"), RangeSpec::full());
        assert_eq!(
            parse_range_header("bytes=abc-99"),
            RangeSpec { start: None, end: Some(99) }
        );
    }
}
