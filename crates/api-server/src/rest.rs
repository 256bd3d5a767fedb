//! Shared REST plumbing: application state, error mapping, and the
//! operational endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use cadence_core::CadenceError;
use cadence_engine::CadenceEngine;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: CadenceEngine,
    pub node_id: String,
    pub start_time: Instant,
    /// Upper bound for one execute-due batch.
    pub execute_due_limit: usize,
}

pub type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

/// Uniform error body. Duplicate enrollments also carry the id and status
/// of the enrollment that blocked the request.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            enrollment_id: None,
            status: None,
        }
    }
}

pub fn bad_request(error: &str, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    metrics::counter!("api.validation_errors").increment(1);
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(error, message)))
}

/// Maps an engine error onto its HTTP status and error body. Internal
/// failures are logged and their detail is not echoed to the caller.
pub fn api_error(err: CadenceError) -> (StatusCode, Json<ErrorResponse>) {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status.is_server_error() {
        error!(error = %err, code = err.code(), "Request failed");
        metrics::counter!("api.errors", "code" => err.code()).increment(1);
        return (
            status,
            Json(ErrorResponse::new(err.code(), "Internal processing error")),
        );
    }

    if status == StatusCode::CONFLICT {
        warn!(error = %err, "Request conflicted");
    }
    let mut body = ErrorResponse::new(err.code(), err.to_string());
    if let CadenceError::DuplicateEnrollment {
        enrollment_id,
        status,
    } = err
    {
        body.enrollment_id = Some(enrollment_id);
        body.status = Some(status);
    }
    (status, Json(body))
}

/// Unwraps a JSON body, turning extractor rejections into the uniform
/// 400 body instead of axum's plain-text default.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| bad_request("invalid_body", rejection.body_text()))
}

/// Query-string counterpart of `json_body`.
pub fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| bad_request("invalid_query", rejection.body_text()))
}

/// Parses a path or body identifier; an id that is not a UUID cannot
/// exist.
pub fn parse_id(entity: &str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| api_error(CadenceError::not_found(entity, raw)))
}

/// GET /health: Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready: Readiness probe.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic"),
        (status = 503, description = "Not ready"),
    )
)]
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.engine.list_sequences(false) {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live: Liveness probe.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
