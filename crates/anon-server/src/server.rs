use axum::{
    Json, Router,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use std::sync::Arc;

use anon_core::render::{not_found_page, unavailable_page};
use anon_engine::{Outcome, Pipeline};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub struct AnonServer;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AnonServer {
    pub async fn serve(pipeline: Arc<Pipeline>, host: &str, port: u16) -> anyhow::Result<()> {
        let app = router(pipeline);

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;

        info!("anon server listening on {}", addr);

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Routes of the browsing shell. `/r/` is a short alias of `/repository/`.
pub fn router(pipeline: Arc<Pipeline>) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/", get(handle_info))
        .route("/repository/:id", get(redirect_to_root))
        .route("/repository/:id/", get(browse_root))
        .route("/repository/:id/*path", get(browse_path))
        .route("/r/:id", get(redirect_to_root))
        .route("/r/:id/", get(browse_root))
        .route("/r/:id/*path", get(browse_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET / - service info
async fn handle_info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "anon",
        "version": env!("CARGO_PKG_VERSION"),
        "public_url": state.pipeline.public_url(),
    }))
}

/// GET /repository/:id - canonical form has a trailing slash
async fn redirect_to_root(OriginalUri(uri): OriginalUri) -> Redirect {
    Redirect::temporary(&format!("{}/", uri.path()))
}

/// GET /repository/:id/
async fn browse_root(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    browse(&state, &uri, &headers, &id, "").await
}

/// GET /repository/:id/*path
async fn browse_path(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Path((id, path)): Path<(String, String)>,
) -> Response {
    browse(&state, &uri, &headers, &id, &path).await
}

async fn browse(state: &AppState, uri: &axum::http::Uri, headers: &HeaderMap, id: &str, path: &str) -> Response {
    match state.pipeline.handle(id, path).await {
        Ok(Outcome::Page { page, etag }) => {
            let etag = format!("\"{}\"", etag);
            if if_none_match(headers, &etag) {
                return (StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response();
            }
            let content_type = HeaderValue::from_str(&page.content_type.header_value())
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, content_type)],
                [(header::ETAG, etag)],
                page.bytes,
            )
                .into_response()
        }
        // Same path plus the separator, under whichever prefix was used.
        Ok(Outcome::Redirect) => Redirect::temporary(&format!("{}/", uri.path())).into_response(),
        Ok(Outcome::NotFound) => (StatusCode::NOT_FOUND, Html(not_found_page(&format!("/{}", path)))).into_response(),
        Ok(Outcome::SnapshotUnavailable) => (StatusCode::NOT_FOUND, Html(unavailable_page(id))).into_response(),
        Err(e) => {
            error!(repository_id = id, path, error = %e, "request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|candidate| candidate.trim() == etag || candidate.trim() == "*"))
}
