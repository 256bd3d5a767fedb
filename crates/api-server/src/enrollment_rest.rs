//! Enrollment REST API endpoints: enroll, query, transition, execute.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cadence_core::CadenceError;
use cadence_engine::types::{EnrollmentFilter, EnrollmentStatus, NewEnrollment, TransitionAction};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::rest::{
    api_error, bad_request, json_body, parse_id, query_params, ApiResult, AppState,
    ErrorResponse,
};
use crate::views::{
    EnrollmentDetailView, EnrollmentListView, EnrollmentView, ExecuteDueView, ExecuteView,
    StepLogView, TransitionView,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    #[serde(default)]
    pub sequence_id: String,
    #[serde(default)]
    pub contact_id: String,
    #[serde(default)]
    pub company_domain: String,
    #[serde(default)]
    pub enrolled_by: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransitionRequest {
    /// One of `pause`, `resume`, `unenroll`, `advance`.
    pub action: String,
    /// Recorded on the completed step log; `advance` only.
    pub outcome: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ExecuteDueRequest {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct EnrollmentQuery {
    pub contact_id: Option<String>,
    pub sequence_id: Option<String>,
    /// `active`, `paused`, `completed` or `unenrolled`.
    pub status: Option<String>,
    /// Only enrollments due at or before this instant; implies `status=active`.
    pub due_by: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// POST /enrollments: Enroll a contact in a sequence.
#[utoipa::path(
    post,
    path = "/enrollments",
    tag = "Enrollments",
    request_body = CreateEnrollmentRequest,
    responses(
        (status = 201, description = "Contact enrolled", body = EnrollmentView),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Sequence not found", body = ErrorResponse),
        (status = 409, description = "Contact already has an open enrollment", body = ErrorResponse),
    )
)]
pub async fn create_enrollment(
    State(state): State<AppState>,
    payload: Result<Json<CreateEnrollmentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<EnrollmentView>)> {
    let req = json_body(payload)?;
    if req.sequence_id.trim().is_empty() {
        return Err(api_error(CadenceError::Validation(
            "sequenceId is required".to_string(),
        )));
    }
    let sequence_id = parse_id("Sequence", &req.sequence_id)?;

    let enrollment = state
        .engine
        .enroll(NewEnrollment {
            sequence_id,
            contact_id: req.contact_id.trim().to_string(),
            company_domain: req.company_domain.trim().to_lowercase(),
            enrolled_by: req.enrolled_by.trim().to_string(),
        })
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(enrollment.into())))
}

/// GET /enrollments: List enrollments by contact, sequence, status or due date.
#[utoipa::path(
    get,
    path = "/enrollments",
    tag = "Enrollments",
    params(EnrollmentQuery),
    responses(
        (status = 200, description = "Matching enrollments", body = EnrollmentListView),
        (status = 400, description = "Invalid filter", body = ErrorResponse),
    )
)]
pub async fn list_enrollments(
    State(state): State<AppState>,
    query: Result<Query<EnrollmentQuery>, QueryRejection>,
) -> ApiResult<Json<EnrollmentListView>> {
    let query = query_params(query)?;
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(EnrollmentStatus::parse(raw).ok_or_else(|| {
            bad_request("validation_error", format!("Invalid status \"{raw}\""))
        })?),
    };
    let sequence_id = match query.sequence_id.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(parse_id("Sequence", raw)?),
    };

    let enrollments = state
        .engine
        .list_enrollments(EnrollmentFilter {
            contact_id: query.contact_id.filter(|c| !c.is_empty()),
            sequence_id,
            status,
            due_by: query.due_by,
            limit: query.limit,
        })
        .map_err(api_error)?;
    Ok(Json(EnrollmentListView {
        enrollments: enrollments.into_iter().map(EnrollmentView::from).collect(),
    }))
}

/// GET /enrollments/{id}: Enrollment with its step logs.
#[utoipa::path(
    get,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = String, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Enrollment detail", body = EnrollmentDetailView),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
    )
)]
pub async fn get_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<EnrollmentDetailView>> {
    let id = parse_id("Enrollment", &id)?;
    let (enrollment, logs) = state.engine.enrollment_detail(id).map_err(api_error)?;
    Ok(Json(EnrollmentDetailView {
        enrollment: enrollment.into(),
        step_logs: logs.into_iter().map(StepLogView::from).collect(),
    }))
}

/// PUT /enrollments/{id}: Pause, resume, unenroll or advance.
#[utoipa::path(
    put,
    path = "/enrollments/{id}",
    tag = "Enrollments",
    params(("id" = String, Path, description = "Enrollment id")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Transition applied", body = TransitionView),
        (status = 400, description = "Unknown action or transition not allowed", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 409, description = "Lost a race with a concurrent transition", body = ErrorResponse),
    )
)]
pub async fn transition_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TransitionRequest>, JsonRejection>,
) -> ApiResult<Json<TransitionView>> {
    let id = parse_id("Enrollment", &id)?;
    let req = json_body(payload)?;
    let action = TransitionAction::parse(req.action.trim()).ok_or_else(|| {
        bad_request(
            "invalid_action",
            format!(
                "Invalid action \"{}\" (expected pause, resume, unenroll or advance)",
                req.action
            ),
        )
    })?;

    let result = state
        .engine
        .transition(id, action, req.outcome, req.notes)
        .map_err(api_error)?;
    metrics::counter!("api.transitions", "action" => action.as_str()).increment(1);
    Ok(Json(result.into()))
}

/// POST /enrollments/{id}/execute: Run the current step now.
#[utoipa::path(
    post,
    path = "/enrollments/{id}/execute",
    tag = "Enrollments",
    params(("id" = String, Path, description = "Enrollment id")),
    responses(
        (status = 200, description = "Step executed", body = ExecuteView),
        (status = 400, description = "Enrollment is not active", body = ErrorResponse),
        (status = 404, description = "Enrollment not found", body = ErrorResponse),
        (status = 409, description = "Lost a race with a concurrent transition", body = ErrorResponse),
    )
)]
pub async fn execute_enrollment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExecuteView>> {
    let id = parse_id("Enrollment", &id)?;
    let result = state.engine.execute(id).await.map_err(api_error)?;
    Ok(Json(result.into()))
}

/// POST /enrollments/execute-due: Execute every active enrollment that is due.
#[utoipa::path(
    post,
    path = "/enrollments/execute-due",
    tag = "Enrollments",
    request_body(content = ExecuteDueRequest, description = "Optional batch limit"),
    responses(
        (status = 200, description = "Batch report", body = ExecuteDueView),
    )
)]
pub async fn execute_due(
    State(state): State<AppState>,
    payload: Option<Json<ExecuteDueRequest>>,
) -> ApiResult<Json<ExecuteDueView>> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let limit = req
        .limit
        .unwrap_or(state.execute_due_limit)
        .min(state.execute_due_limit);

    let report = state
        .engine
        .execute_due(Utc::now(), limit)
        .await
        .map_err(api_error)?;
    Ok(Json(report.into()))
}
