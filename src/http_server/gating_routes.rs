//! Gating HTTP Routes
//!
//! HTTP endpoints over [`VerificationService`]: lock management,
//! pre-verification, challenge/verify and access checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::challenge::{ChallengeRequest, ChallengeResponse, VerifyRequest};
use crate::credential::{
    AccessDecision, InMemoryCredentialRepository, VerificationService, VerifyResponse,
};
use crate::crypto::constant_time_str_eq;
use crate::gating::{
    Address, CategoryInfo, GatingError, GatingLock, InMemoryLockRepository, VerificationStatus,
};

/// Service type served over HTTP
pub type GateService = VerificationService<InMemoryLockRepository, InMemoryCredentialRepository>;

/// Shared gating state
pub struct GatingState {
    pub service: GateService,
    /// Required for lock writes and revocations when set
    pub admin_token: Option<String>,
}

impl GatingState {
    pub fn new(service: GateService, admin_token: Option<String>) -> Self {
        Self {
            service,
            admin_token,
        }
    }
}

/// Gating routes with shared state
pub fn gating_routes(state: Arc<GatingState>) -> Router {
    Router::new()
        .route("/categories", get(categories_handler))
        .route(
            "/posts/:post_id/lock",
            get(get_lock_handler)
                .put(put_lock_handler)
                .delete(delete_lock_handler),
        )
        .route("/posts/:post_id/status", post(status_handler))
        .route("/posts/:post_id/challenge", post(challenge_handler))
        .route("/posts/:post_id/verify", post(verify_handler))
        .route("/posts/:post_id/access", get(access_handler))
        .route("/credentials/:id", delete(revoke_handler))
        .with_state(state)
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

impl From<GatingError> for ErrorResponse {
    fn from(err: GatingError) -> Self {
        Self {
            error: err.to_string(),
            code: err.status_code(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    #[serde(default)]
    pub addresses: BTreeMap<String, Address>,
}

#[derive(Debug, Serialize)]
pub struct LockResponse {
    pub post_id: String,
    pub fingerprint: String,
    pub lock: GatingLock,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(err: GatingError) -> ApiError {
    if err.is_client_error() {
        warn!(error = %err, code = err.status_code(), "request rejected");
    } else {
        error!(error = %err, code = err.status_code(), "request failed");
    }
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorResponse::from(err)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: rejection.body_text(),
                code: 400,
            }),
        )
    })
}

fn require_admin(state: &GatingState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = &state.admin_token else {
        return Ok(());
    };
    let provided = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if constant_time_str_eq(provided, expected) {
        Ok(())
    } else {
        Err(api_error(GatingError::AdminTokenRequired))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

// ==================
// Handlers
// ==================

async fn categories_handler(State(state): State<Arc<GatingState>>) -> Json<Vec<CategoryInfo>> {
    Json(state.service.categories())
}

async fn get_lock_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
) -> Result<Json<LockResponse>, ApiError> {
    let lock = state.service.get_lock(&post_id).map_err(api_error)?;
    Ok(Json(LockResponse {
        fingerprint: lock.fingerprint(),
        post_id,
        lock,
    }))
}

async fn put_lock_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<GatingLock>, JsonRejection>,
) -> Result<Json<LockResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let lock = body(payload)?;
    let fingerprint = state
        .service
        .set_lock(&post_id, lock.clone())
        .map_err(api_error)?;
    Ok(Json(LockResponse {
        post_id,
        fingerprint,
        lock,
    }))
}

async fn delete_lock_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    state.service.remove_lock(&post_id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn status_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<VerificationStatus>, ApiError> {
    let request = body(payload)?;
    let status = state
        .service
        .pre_verify(&post_id, &request.addresses)
        .await
        .map_err(api_error)?;
    Ok(Json(status))
}

async fn challenge_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    payload: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    let request = body(payload)?;
    let challenge = state
        .service
        .issue_challenge(&post_id, request.claims)
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(challenge)))
}

async fn verify_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let request = body(payload)?;
    let response = state
        .service
        .submit_verification(&post_id, request)
        .await
        .map_err(api_error)?;
    Ok(Json(response))
}

async fn access_handler(
    State(state): State<Arc<GatingState>>,
    Path(post_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<AccessDecision>, ApiError> {
    let decision = state
        .service
        .check_access(&post_id, bearer_token(&headers))
        .map_err(api_error)?;
    Ok(Json(decision))
}

async fn revoke_handler(
    State(state): State<Arc<GatingState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    require_admin(&state, &headers)?;
    state.service.revoke_credential(id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
