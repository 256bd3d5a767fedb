//! Sequence CRUD endpoints.
//!
//! Bodies are taken as raw JSON and validated by
//! `cadence_engine::validation`, so a wrongly-typed field produces the same
//! message as an out-of-range one.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use cadence_engine::validation;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::rest::{
    api_error, json_body, parse_id, query_params, ApiResult, AppState, ErrorResponse,
};
use crate::views::{SequenceListView, SequenceView, StepView};

/// Attributed to sequences created without a `createdBy`.
const DEFAULT_CREATOR: &str = "api";

/// Request body for creating or updating a sequence. On update every field
/// is optional and only supplied fields are changed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<StepView>>,
    pub is_template: Option<bool>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SequenceQuery {
    /// Only return sequences flagged as templates.
    pub templates_only: Option<bool>,
}

/// POST /sequences: Create a sequence.
#[utoipa::path(
    post,
    path = "/sequences",
    tag = "Sequences",
    request_body = SequenceInput,
    responses(
        (status = 201, description = "Sequence created", body = SequenceView),
        (status = 400, description = "Invalid sequence", body = ErrorResponse),
    )
)]
pub async fn create_sequence(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SequenceView>)> {
    let raw = json_body(payload)?;
    let new = validation::parse_new_sequence(&raw, DEFAULT_CREATOR).map_err(api_error)?;
    let sequence = state.engine.create_sequence(new).map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(sequence.into())))
}

/// GET /sequences: List sequences, newest first.
#[utoipa::path(
    get,
    path = "/sequences",
    tag = "Sequences",
    params(SequenceQuery),
    responses(
        (status = 200, description = "Sequences", body = SequenceListView),
        (status = 400, description = "Invalid query", body = ErrorResponse),
    )
)]
pub async fn list_sequences(
    State(state): State<AppState>,
    query: Result<Query<SequenceQuery>, QueryRejection>,
) -> ApiResult<Json<SequenceListView>> {
    let query = query_params(query)?;
    let sequences = state
        .engine
        .list_sequences(query.templates_only.unwrap_or(false))
        .map_err(api_error)?;
    Ok(Json(SequenceListView {
        sequences: sequences.into_iter().map(SequenceView::from).collect(),
    }))
}

/// GET /sequences/{id}: Fetch one sequence.
#[utoipa::path(
    get,
    path = "/sequences/{id}",
    tag = "Sequences",
    params(("id" = String, Path, description = "Sequence id")),
    responses(
        (status = 200, description = "Sequence", body = SequenceView),
        (status = 404, description = "Sequence not found", body = ErrorResponse),
    )
)]
pub async fn get_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SequenceView>> {
    let id = parse_id("Sequence", &id)?;
    let sequence = state.engine.get_sequence(id).map_err(api_error)?;
    Ok(Json(sequence.into()))
}

/// PUT /sequences/{id}: Update the supplied fields of a sequence.
#[utoipa::path(
    put,
    path = "/sequences/{id}",
    tag = "Sequences",
    params(("id" = String, Path, description = "Sequence id")),
    request_body = SequenceInput,
    responses(
        (status = 200, description = "Sequence updated", body = SequenceView),
        (status = 400, description = "Invalid update", body = ErrorResponse),
        (status = 404, description = "Sequence not found", body = ErrorResponse),
    )
)]
pub async fn update_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SequenceView>> {
    let id = parse_id("Sequence", &id)?;
    let raw = json_body(payload)?;
    let update = validation::parse_sequence_update(&raw).map_err(api_error)?;
    let sequence = state.engine.update_sequence(id, update).map_err(api_error)?;
    Ok(Json(sequence.into()))
}

/// DELETE /sequences/{id}: Delete a sequence with no open enrollments.
#[utoipa::path(
    delete,
    path = "/sequences/{id}",
    tag = "Sequences",
    params(("id" = String, Path, description = "Sequence id")),
    responses(
        (status = 204, description = "Sequence deleted"),
        (status = 400, description = "Sequence still has active or paused enrollments", body = ErrorResponse),
        (status = 404, description = "Sequence not found", body = ErrorResponse),
    )
)]
pub async fn delete_sequence(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id("Sequence", &id)?;
    state.engine.delete_sequence(id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
