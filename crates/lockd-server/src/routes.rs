//! API route definitions.
//!
//! Every handler returns `{success, message?, data?}` with HTTP 200 for any
//! well-formed, understood request — `success: false` carries the failure,
//! not the status code. Malformed JSON or a missing required field never
//! reaches a handler: axum's `Json` extractor rejects it with 400 first.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use lockd_core::{LeaseView, LockError};

use crate::AppState;

/// Create API routes
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/lock/acquire", post(acquire))
        .route("/lock/heartbeat", post(heartbeat))
        .route("/lock/release", post(release))
        .route("/lock/force-release", post(force_release))
        .route("/lock/list", get(list))
        .with_state(state)
}

/// Uniform response envelope for every lock endpoint.
#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    fn ok_empty() -> ApiResponse<()> {
        ApiResponse {
            success: true,
            message: None,
            data: None,
        }
    }

    fn err(error: LockError) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            message: Some(error.to_string()),
            data: None,
        }
    }
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "live_leases": state.registry.live_count(),
        "uptime_secs": state.uptime_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct AcquireRequest {
    namespace: Option<String>,
    user_id: String,
    user_name: Option<String>,
    business_id: String,
    #[serde(rename = "timeout")]
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AcquireData {
    lock_id: String,
    reentrant: bool,
}

async fn acquire(
    State(state): State<AppState>,
    Json(req): Json<AcquireRequest>,
) -> impl IntoResponse {
    match state.registry.acquire(
        req.namespace.as_deref(),
        &req.user_id,
        req.user_name.as_deref(),
        &req.business_id,
        req.timeout_seconds,
    ) {
        Ok(outcome) => Json(ApiResponse::ok(AcquireData {
            lock_id: outcome.lock_id,
            reentrant: outcome.reentrant,
        }))
        .into_response(),
        Err(e) => Json(ApiResponse::<()>::err(e)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct LockIdRequest {
    lock_id: String,
}

async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<LockIdRequest>,
) -> impl IntoResponse {
    match state.registry.heartbeat(&req.lock_id) {
        Ok(()) => Json(ApiResponse::ok_empty()).into_response(),
        Err(e) => Json(ApiResponse::<()>::err(e)).into_response(),
    }
}

async fn release(
    State(state): State<AppState>,
    Json(req): Json<LockIdRequest>,
) -> impl IntoResponse {
    match state.registry.release(&req.lock_id) {
        Ok(()) => Json(ApiResponse::ok_empty()).into_response(),
        Err(e) => Json(ApiResponse::<()>::err(e)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ForceReleaseRequest {
    lock_id: String,
    reason: String,
}

async fn force_release(
    State(state): State<AppState>,
    Json(req): Json<ForceReleaseRequest>,
) -> impl IntoResponse {
    match state.registry.force_release(&req.lock_id, &req.reason) {
        Ok(()) => Json(ApiResponse::ok_empty()).into_response(),
        Err(e) => Json(ApiResponse::<()>::err(e)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    namespace: Option<String>,
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LeaseEntry {
    lock_id: String,
    namespace: String,
    business_id: String,
    user_id: String,
    user_name: Option<String>,
    timeout_seconds: u64,
    seconds_remaining: u64,
}

impl From<LeaseView> for LeaseEntry {
    fn from(v: LeaseView) -> Self {
        Self {
            lock_id: v.lock_id,
            namespace: v.namespace,
            business_id: v.business_id,
            user_id: v.user_id,
            user_name: v.user_name,
            timeout_seconds: v.timeout_seconds,
            seconds_remaining: v.seconds_remaining,
        }
    }
}

async fn list(State(state): State<AppState>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    let leases: Vec<LeaseEntry> = state
        .registry
        .list(q.namespace.as_deref(), q.user_id.as_deref())
        .into_iter()
        .map(LeaseEntry::from)
        .collect();
    Json(ApiResponse::ok(leases))
}
