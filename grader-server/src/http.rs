//! Grader HTTP API
//!
//! Axum server for the Telegram webhook plus a small REST surface.
//!
//! Each endpoint has a thin axum handler that delegates to an inner function;
//! the inner functions are directly testable without axum dispatch.
//!
//! Endpoints:
//! - POST /telegram/webhook  acknowledge an update and grade it in the background
//! - GET  /health            health check with DB status
//! - GET  /version           server version info
//! - POST /score             score a text answer against an ideal answer

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use grader_core::{fuse, EmbeddingBackend, ScoreWeights};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;

use crate::router::UpdateRouter;
use crate::subsystems::store::GradingStore;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub router: Arc<UpdateRouter>,
    pub store: Arc<dyn GradingStore>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub weights: ScoreWeights,
    /// Background update handlers; closed and awaited on shutdown.
    pub tasks: TaskTracker,
}

pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/telegram/webhook", post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/score", post(score_handler))
        .with_state(state)
}

/// Serve until the broadcast shutdown signal fires.
pub async fn start_http_server(
    addr: &str,
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = build_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Grader HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub student_text: Option<String>,
    pub ideal_text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub weights: Option<ScoreWeights>,
}

fn error_body(msg: impl Into<String>) -> serde_json::Value {
    serde_json::json!({
        "error": msg.into(),
        "status": "error",
    })
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Acknowledge immediately; the update is processed on a tracked task so a
/// slow transcription never holds the webhook connection open.
pub fn webhook_inner(
    router: Arc<UpdateRouter>,
    tasks: &TaskTracker,
    update: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    tasks.spawn(async move {
        router.handle_update(update).await;
    });
    (StatusCode::OK, serde_json::json!({ "ok": true }))
}

pub async fn health_inner(store: &dyn GradingStore) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(backend) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "database": backend,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "grader",
    })
}

pub async fn score_inner(
    embedder: &dyn EmbeddingBackend,
    default_weights: &ScoreWeights,
    req: ScoreRequest,
) -> (StatusCode, serde_json::Value) {
    let student = match req.student_text {
        Some(s) if !s.trim().is_empty() => s,
        _ => return (StatusCode::BAD_REQUEST, error_body("student_text is required")),
    };
    let ideal = match req.ideal_text {
        Some(s) if !s.trim().is_empty() => s,
        _ => return (StatusCode::BAD_REQUEST, error_body("ideal_text is required")),
    };
    let weights = req.weights.unwrap_or(*default_weights);

    let start = Instant::now();
    match fuse(embedder, &student, &ideal, &req.keywords, &weights).await {
        Ok(breakdown) => {
            let took_ms = start.elapsed().as_millis() as u64;
            (
                StatusCode::OK,
                serde_json::json!({
                    "score": breakdown.final_score,
                    "breakdown": breakdown,
                    "weights": weights,
                    "embedding_backend": embedder.name(),
                    "took_ms": took_ms,
                }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Scoring request failed");
            (StatusCode::BAD_GATEWAY, error_body(e.to_string()))
        }
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn webhook_handler(
    State(state): State<Arc<HttpState>>,
    Json(update): Json<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = webhook_inner(state.router.clone(), &state.tasks, update);
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn score_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ScoreRequest>,
) -> impl IntoResponse {
    let (status, body) = score_inner(state.embedder.as_ref(), &state.weights, req).await;
    (status, Json(body))
}
