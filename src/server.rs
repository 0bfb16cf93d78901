// SYNOID Stitch HTTP Server
// Copyright (c) 2026 Xing_The_Creator | SYNOID

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, Request, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt; // For oneshot
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::error::StitchError;
use crate::state::StitchState;
use crate::stitch::expiry::Access;
use crate::stitch::publisher::{RequestOrigin, SERVE_PATH};

pub type AppState = Arc<StitchState>;

#[derive(Debug, Serialize)]
pub struct StitchResponse {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in_minutes: Option<u64>,
}

pub fn create_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let mut router = Router::new()
        .route("/", get(liveness))
        .route("/stitch", post(handle_stitch).layer(upload_limit));

    if state.registry.is_some() {
        router = router.route(&format!("{}/:file", SERVE_PATH), get(serve_video));
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(port: u16, state: AppState) -> std::io::Result<()> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Stitch server listening on port {}", port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested, draining in-flight jobs...");
}

async fn liveness() -> &'static str {
    "OK"
}

async fn handle_stitch(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StitchResponse>, StitchError> {
    let mut multipart =
        multipart.map_err(|e| StitchError::validation(format!("expected a multipart form: {}", e)))?;
    let origin = RequestOrigin::from_headers(&headers);

    let publication = state.pipeline.run(&mut multipart, &origin).await?;

    Ok(Json(StitchResponse {
        success: true,
        url: publication.url,
        expires_in_minutes: publication.expires_in_minutes,
    }))
}

async fn serve_video(
    State(state): State<AppState>,
    Path(file): Path<String>,
    req: Request,
) -> Response {
    let Some(registry) = &state.registry else {
        return StitchError::NotFound.into_response();
    };

    match registry.access(&file, Utc::now()).await {
        Access::Servable(path) => match ServeFile::new(path).oneshot(req).await {
            Ok(res) => res.into_response(),
            Err(err) => {
                error!("ServeFile error: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Access::Gone => StitchError::Gone.into_response(),
        Access::NotFound => StitchError::NotFound.into_response(),
    }
}
