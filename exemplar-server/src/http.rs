//! Exemplar HTTP REST API
//!
//! Axum-based HTTP server exposing Teach / Predict / Validate over HTTP.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions are directly testable without axum dispatch
//! machinery.
//!
//! Endpoints:
//! - GET    /health         — store and embedder status
//! - GET    /version        — server version info
//! - POST   /train          — teach a corrected example (alias: /teach)
//! - POST   /predict        — retrieve similar examples and assemble the prompt
//! - POST   /validate       — check a model answer against a field list
//! - GET    /stats          — collection statistics
//! - GET    /examples/:id   — fetch one taught example
//! - DELETE /examples/:id   — forget one taught example

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use exemplar_core::protocol::{ExemplarRequest, ExemplarResponse, PROTOCOL};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::context::AppContext;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub ctx: AppContext,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/train", post(train_handler))
        .route("/teach", post(train_handler))
        .route("/predict", post(predict_handler))
        .route("/validate", post(validate_handler))
        .route("/stats", get(stats_handler))
        .route("/examples/:id", get(get_example_handler).delete(delete_example_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(ctx: AppContext, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let addr = format!("{}:{}", ctx.config.http.host, ctx.config.http.port);
    let state = Arc::new(HttpState { ctx });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Exemplar HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct TrainRequest {
    pub user_input: Option<String>,
    /// JSON value, or a string containing JSON.
    pub correct_output: Option<serde_json::Value>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PredictRequest {
    pub user_input: Option<String>,
    /// Array of fields, or a string containing one.
    pub config_json: Option<serde_json::Value>,
    /// Array of colours, or a comma-separated string.
    #[serde(default)]
    pub color_list: serde_json::Value,
    pub n_results: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ValidateRequest {
    #[serde(default)]
    pub output: serde_json::Value,
    pub raw: Option<String>,
    pub config_json: Option<serde_json::Value>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    fn into_body(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({"status": "error"}))
    }
}

fn bad_request(msg: &str) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::BAD_REQUEST,
        ErrorResponse::new(msg).with_code("invalid_input").into_body(),
    )
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — counts stored examples.
pub async fn health_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    let response = crate::router::handle_request(ExemplarRequest::Health, ctx).await;
    let (status, mut body) = response_to_http(response);
    let healthy = status == StatusCode::OK;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
        if !healthy {
            obj.insert("status".to_string(), serde_json::json!("unhealthy"));
        }
    }
    if healthy {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL,
    })
}

/// Inner train — validates the payload and teaches one example.
pub async fn train_inner(ctx: &AppContext, req: TrainRequest) -> (StatusCode, serde_json::Value) {
    let user_input = match req.user_input {
        Some(u) if !u.trim().is_empty() => u,
        _ => return bad_request("user_input field is required"),
    };

    let correct_output = match req.correct_output {
        None | Some(serde_json::Value::Null) => {
            return bad_request("correct_output field is required")
        }
        Some(serde_json::Value::String(s)) => match serde_json::from_str(&s) {
            Ok(v) => v,
            Err(_) => return bad_request("correct_output must be valid JSON"),
        },
        Some(v) => v,
    };

    let request = ExemplarRequest::Teach {
        user_input,
        correct_output,
        category: req.category,
    };
    response_to_http(crate::router::handle_request(request, ctx).await)
}

/// Inner predict — assembles the prompt (and runs generation when enabled).
pub async fn predict_inner(ctx: &AppContext, req: PredictRequest) -> (StatusCode, serde_json::Value) {
    let user_input = match req.user_input {
        Some(u) if !u.trim().is_empty() => u,
        _ => return bad_request("user_input field is required"),
    };
    let config_json = match req.config_json {
        Some(c) if !c.is_null() => c,
        _ => return bad_request("config_json field is required"),
    };

    let start = Instant::now();

    let request = ExemplarRequest::Predict {
        user_input,
        config_json,
        color_list: req.color_list,
        n_results: req.n_results,
    };
    let (status, mut body) = response_to_http(crate::router::handle_request(request, ctx).await);

    if status == StatusCode::OK {
        if let Some(obj) = body.as_object_mut() {
            obj.insert(
                "took_ms".to_string(),
                serde_json::json!(start.elapsed().as_millis() as u64),
            );
        }
    }
    (status, body)
}

/// Inner validate — checks a parsed output or raw model text.
pub async fn validate_inner(ctx: &AppContext, req: ValidateRequest) -> (StatusCode, serde_json::Value) {
    let config_json = match req.config_json {
        Some(c) if !c.is_null() => c,
        _ => return bad_request("config_json field is required"),
    };

    let request = ExemplarRequest::Validate {
        output: req.output,
        raw: req.raw,
        config_json,
    };
    response_to_http(crate::router::handle_request(request, ctx).await)
}

pub async fn stats_inner(ctx: &AppContext) -> (StatusCode, serde_json::Value) {
    response_to_http(crate::router::handle_request(ExemplarRequest::Stats, ctx).await)
}

pub async fn get_example_inner(ctx: &AppContext, id: String) -> (StatusCode, serde_json::Value) {
    let (status, body) =
        response_to_http(crate::router::handle_request(ExemplarRequest::GetExample { id }, ctx).await);
    if status == StatusCode::OK && body["found"] == false {
        return (StatusCode::NOT_FOUND, body);
    }
    (status, body)
}

pub async fn delete_example_inner(ctx: &AppContext, id: String) -> (StatusCode, serde_json::Value) {
    let (status, body) =
        response_to_http(crate::router::handle_request(ExemplarRequest::DeleteExample { id }, ctx).await);
    if status == StatusCode::OK && body["deleted"] == false {
        return (StatusCode::NOT_FOUND, body);
    }
    (status, body)
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn train_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<TrainRequest>,
) -> impl IntoResponse {
    let (status, body) = train_inner(&state.ctx, req).await;
    (status, Json(body))
}

pub async fn predict_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<PredictRequest>,
) -> impl IntoResponse {
    let (status, body) = predict_inner(&state.ctx, req).await;
    (status, Json(body))
}

pub async fn validate_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ValidateRequest>,
) -> impl IntoResponse {
    let (status, body) = validate_inner(&state.ctx, req).await;
    (status, Json(body))
}

pub async fn stats_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = stats_inner(&state.ctx).await;
    (status, Json(body))
}

pub async fn get_example_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_example_inner(&state.ctx, id).await;
    (status, Json(body))
}

pub async fn delete_example_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_example_inner(&state.ctx, id).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// HTTP status for an error code carried in the response envelope.
pub fn status_for_code(code: Option<&str>) -> StatusCode {
    match code {
        Some("invalid_input") | Some("malformed_config") => StatusCode::BAD_REQUEST,
        Some("embedding_unavailable")
        | Some("retrieval_unavailable")
        | Some("generation_unavailable") => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert an `ExemplarResponse` into an HTTP status and body.
pub fn response_to_http(response: ExemplarResponse) -> (StatusCode, serde_json::Value) {
    if response.is_ok() {
        return (
            StatusCode::OK,
            response.data.unwrap_or(serde_json::json!({})),
        );
    }

    let status = status_for_code(response.code.as_deref());
    let mut err = ErrorResponse::new(response.error.unwrap_or_else(|| "unknown error".to_string()));
    err.code = response.code;
    (status, err.into_body())
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
