//! Recap HTTP API
//!
//! Axum-based HTTP server exposing summary CRUD, the inbound summary webhook
//! and the email-summary proxy.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /health                 — health check with store status
//! - GET    /version                — server version info
//! - GET    /api/summaries          — list summaries (startDate, endDate, search)
//! - POST   /api/summaries          — create a summary
//! - GET    /api/summaries/:id      — fetch one summary
//! - DELETE /api/summaries/:id      — delete one summary
//! - POST   /api/webhook            — create a summary from an authenticated webhook
//! - POST   /api/summarize-emails   — fetch and normalize upstream email summaries

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use recap_core::{
    authenticate, EmailSource, NewSummary, RecapConfig, RecapError, SummaryFilter, SummaryStore,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub store: Arc<dyn SummaryStore>,
    pub emails: Arc<dyn EmailSource>,
    pub config: RecapConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route(
            "/api/summaries",
            get(list_summaries_handler).post(create_summary_handler),
        )
        .route(
            "/api/summaries/:id",
            get(get_summary_handler).delete(delete_summary_handler),
        )
        .route(
            "/api/webhook",
            post(webhook_handler).get(method_not_allowed_handler),
        )
        .route(
            "/api/summarize-emails",
            post(summarize_emails_handler).get(method_not_allowed_handler),
        )
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: HttpState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = state.config.http_addr();
    let app = build_router(Arc::new(state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Recap HTTP API listening on http://{}", addr);

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

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateSummaryRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary_text: Option<String>,
}

/// Body posted by the external automation service.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary_text: Option<String>,
    pub secret: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check — asks the store and returns (status_code, json_body).
pub async fn health_inner(store: &dyn SummaryStore) -> (StatusCode, serde_json::Value) {
    match store.health().await {
        Ok(info) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
                "backend": info,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "recap",
    })
}

pub async fn list_summaries_inner(
    store: &dyn SummaryStore,
    query: SummaryQuery,
) -> (StatusCode, serde_json::Value) {
    let filter = match SummaryFilter::from_query(
        query.start_date.as_deref(),
        query.end_date.as_deref(),
        query.search.as_deref(),
    ) {
        Ok(f) => f,
        Err(e) => return error_response(&e, "Failed to fetch summaries"),
    };

    match store.list(&filter).await {
        Ok(summaries) => (StatusCode::OK, json!({ "summaries": summaries })),
        Err(e) => error_response(&e, "Failed to fetch summaries"),
    }
}

pub async fn create_summary_inner(
    store: &dyn SummaryStore,
    req: CreateSummaryRequest,
) -> (StatusCode, serde_json::Value) {
    let new = match NewSummary::validate(req.title, req.url, req.summary_text) {
        Ok(n) => n,
        Err(e) => return error_response(&e, "Failed to create summary"),
    };

    match store.create(new).await {
        Ok(summary) => (StatusCode::CREATED, json!({ "summary": summary })),
        Err(e) => error_response(&e, "Failed to create summary"),
    }
}

pub async fn get_summary_inner(
    store: &dyn SummaryStore,
    id: &str,
) -> (StatusCode, serde_json::Value) {
    let Ok(id) = Uuid::parse_str(id) else {
        return error_response(&RecapError::NotFound, "Failed to fetch summary");
    };

    match store.get(id).await {
        Ok(Some(summary)) => (StatusCode::OK, json!({ "summary": summary })),
        Ok(None) => error_response(&RecapError::NotFound, "Failed to fetch summary"),
        Err(e) => error_response(&e, "Failed to fetch summary"),
    }
}

pub async fn delete_summary_inner(
    store: &dyn SummaryStore,
    id: &str,
) -> (StatusCode, serde_json::Value) {
    let Ok(id) = Uuid::parse_str(id) else {
        return error_response(&RecapError::NotFound, "Failed to delete summary");
    };

    match store.delete(id).await {
        Ok(Some(summary)) => (StatusCode::OK, json!({ "summary": summary })),
        Ok(None) => error_response(&RecapError::NotFound, "Failed to delete summary"),
        Err(e) => error_response(&e, "Failed to delete summary"),
    }
}

/// Inner webhook — takes the raw body so the secret is checked before any
/// field is decoded or validated.
pub async fn webhook_inner(
    store: &dyn SummaryStore,
    config: &RecapConfig,
    body: Value,
) -> (StatusCode, serde_json::Value) {
    let provided = body.get("secret").and_then(Value::as_str);
    if !authenticate(config.webhook.secret.as_deref(), provided) {
        tracing::warn!("Rejected webhook call with invalid secret");
        return error_response(&RecapError::Unauthorized, "Internal server error");
    }

    let payload: WebhookPayload = match decode_body(body) {
        Ok(p) => p,
        Err(e) => return error_response(&e, "Internal server error"),
    };

    let new = match NewSummary::validate(payload.title, payload.url, payload.summary_text) {
        Ok(n) => n,
        Err(e) => return error_response(&e, "Internal server error"),
    };

    match store.create(new).await {
        Ok(summary) => (
            StatusCode::CREATED,
            json!({
                "success": true,
                "summary": {
                    "id": summary.id,
                    "title": summary.title,
                    "url": summary.url,
                    "createdAt": summary.created_at,
                },
            }),
        ),
        Err(e) => error_response(&e, "Internal server error"),
    }
}

/// Inner email proxy — never fails; upstream problems yield an empty list.
pub async fn summarize_emails_inner(
    emails: &dyn EmailSource,
    now: DateTime<Utc>,
) -> (StatusCode, serde_json::Value) {
    match emails.fetch(now).await {
        Ok(summaries) => {
            tracing::info!(count = summaries.len(), "Returning email summaries");
            (StatusCode::OK, json!({ "summaries": summaries }))
        }
        Err(e) => {
            tracing::error!(error = %e, source = emails.name(), "Error fetching email summaries");
            (StatusCode::OK, json!({ "summaries": [] }))
        }
    }
}

pub fn method_not_allowed_inner() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        json!({ "error": "Method not allowed" }),
    )
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn list_summaries_handler(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<SummaryQuery>,
) -> impl IntoResponse {
    let (status, body) = list_summaries_inner(state.store.as_ref(), query).await;
    (status, Json(body))
}

pub async fn create_summary_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let req = match json_body(body).and_then(decode_body::<CreateSummaryRequest>) {
        Ok(req) => req,
        Err(e) => {
            let (status, body) = error_response(&e, "Failed to create summary");
            return (status, Json(body));
        }
    };
    let (status, body) = create_summary_inner(state.store.as_ref(), req).await;
    (status, Json(body))
}

pub async fn get_summary_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = get_summary_inner(state.store.as_ref(), &id).await;
    (status, Json(body))
}

pub async fn delete_summary_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let (status, body) = delete_summary_inner(state.store.as_ref(), &id).await;
    (status, Json(body))
}

pub async fn webhook_handler(
    State(state): State<Arc<HttpState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    // An unreadable body has no secret in it, so it fails authentication.
    let payload = json_body(body).unwrap_or(Value::Null);
    let (status, body) = webhook_inner(state.store.as_ref(), &state.config, payload).await;
    (status, Json(body))
}

pub async fn summarize_emails_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = summarize_emails_inner(state.emails.as_ref(), Utc::now()).await;
    (status, Json(body))
}

pub async fn method_not_allowed_handler() -> impl IntoResponse {
    let (status, body) = method_not_allowed_inner();
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

/// Unwrap the JSON extractor, turning axum's plain-text rejection into an
/// error that `error_response` renders as JSON.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, RecapError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| RecapError::InvalidBody(rejection.body_text()))
}

fn decode_body<T: DeserializeOwned>(body: Value) -> Result<T, RecapError> {
    serde_json::from_value(body).map_err(|e| RecapError::InvalidBody(e.to_string()))
}

/// Map a `RecapError` to an HTTP status and body. Server-side failures are
/// logged and reported with `fallback` only.
pub fn error_response(err: &RecapError, fallback: &str) -> (StatusCode, serde_json::Value) {
    match err {
        RecapError::Validation { missing } => (
            StatusCode::BAD_REQUEST,
            json!({ "error": err.to_string(), "missing": missing }),
        ),
        RecapError::InvalidQuery(_) | RecapError::InvalidBody(_) => {
            (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
        }
        RecapError::Unauthorized => (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
        RecapError::NotFound => (StatusCode::NOT_FOUND, json!({ "error": "Summary not found" })),
        _ => {
            tracing::error!(error = %err, "{}", fallback);
            (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": fallback }))
        }
    }
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
