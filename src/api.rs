use std::path::Path;

use axum::{
    extract::{rejection::QueryRejection, Query, Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::ingest::types::Feed;
use crate::ingest::{BULK_LIMIT, LATEST_LIMIT};
use crate::pipeline::QuakePipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: QuakePipeline,
    /// Present when the binary installed a Prometheus recorder.
    pub metrics: Option<PrometheusHandle>,
}

/// Full HTTP surface: quake API, health, metrics, static files. Every response,
/// static files and CORS preflights included, is marked non-cacheable.
pub fn router(state: AppState, allowed_origins: &[String], static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/metrics", get(render_metrics))
        .route("/api/quakes", get(latest))
        .route("/api/quakes/all", get(bulk))
        .route("/api/phivolcs", get(latest))
        .route("/api/phivolcs/all", get(bulk))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors_layer(allowed_origins))
        .layer(middleware::from_fn(no_store))
        .with_state(state)
}

/// `*` anywhere in the list opens CORS to every origin.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o.trim() == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origin_values(allowed_origins))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::CACHE_CONTROL])
}

fn origin_values(allowed_origins: &[String]) -> Vec<HeaderValue> {
    allowed_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect()
}

async fn no_store(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let h = resp.headers_mut();
    h.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    h.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    h.insert(header::EXPIRES, HeaderValue::from_static("0"));
    h.insert(
        HeaderName::from_static("surrogate-control"),
        HeaderValue::from_static("no-store"),
    );
    resp
}

#[derive(serde::Deserialize)]
struct FeedQuery {
    feed: Option<String>,
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: &'static str,
}

/// A query string that does not deserialize (duplicate or malformed `feed`)
/// selects the default feed instead of rejecting the request.
fn feed_from(q: Result<Query<FeedQuery>, QueryRejection>) -> Feed {
    let raw = q.ok().and_then(|Query(q)| q.feed);
    Feed::parse(raw.as_deref())
}

async fn latest(
    State(state): State<AppState>,
    q: Result<Query<FeedQuery>, QueryRejection>,
) -> Response {
    respond(&state, "latest", LATEST_LIMIT, feed_from(q), "Unable to fetch earthquake data").await
}

async fn bulk(
    State(state): State<AppState>,
    q: Result<Query<FeedQuery>, QueryRejection>,
) -> Response {
    respond(&state, "all", BULK_LIMIT, feed_from(q), "Unable to fetch all earthquake data").await
}

async fn respond(
    state: &AppState,
    endpoint: &'static str,
    limit: usize,
    feed: Feed,
    failure: &'static str,
) -> Response {
    counter!("quake_requests_total", "endpoint" => endpoint).increment(1);
    match state.pipeline.run(limit, feed).await {
        Ok(records) => Json(records).into_response(),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody { error: failure }),
        )
            .into_response(),
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(h) => h.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
