//! `/pullRequest/*` routes

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use roster_core::StatsReport;

use super::{body, query};
use crate::dto::{
    CreatePrRequest, MergePrRequest, PrQuery, PrResponse, PullRequestBody, ReassignRequest,
    ReassignResponse,
};
use crate::error::ApiError;
use crate::AppState;

/// `POST /pullRequest/create`
pub async fn create_pr(
    State(state): State<AppState>,
    payload: Result<Json<CreatePrRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrResponse>), ApiError> {
    let req = body(payload)?;
    let pr = state
        .services()
        .pull_requests
        .create_pr(&req.pull_request_id, &req.pull_request_name, &req.author_id)
        .await
        .map_err(ApiError::pr)?;

    Ok((StatusCode::CREATED, Json(PrResponse { pr: pr.into() })))
}

/// `POST /pullRequest/merge`
///
/// Idempotent: merging a merged pull request returns 200 with it unchanged.
pub async fn merge_pr(
    State(state): State<AppState>,
    payload: Result<Json<MergePrRequest>, JsonRejection>,
) -> Result<Json<PrResponse>, ApiError> {
    let req = body(payload)?;
    let pr = state
        .services()
        .pull_requests
        .merge_pr(&req.pull_request_id)
        .await
        .map_err(ApiError::pr)?;

    Ok(Json(PrResponse { pr: pr.into() }))
}

/// `POST /pullRequest/reassign`
pub async fn reassign(
    State(state): State<AppState>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignResponse>, ApiError> {
    let req = body(payload)?;
    let reassignment = state
        .services()
        .pull_requests
        .reassign_reviewer(&req.pull_request_id, &req.old_reviewer_id)
        .await
        .map_err(ApiError::pr)?;

    Ok(Json(ReassignResponse {
        pr: reassignment.pr.into(),
        replaced_by: reassignment.replaced_by,
    }))
}

/// `GET /pullRequest/get?pull_request_id=`
pub async fn get_pr(
    State(state): State<AppState>,
    params: Result<Query<PrQuery>, QueryRejection>,
) -> Result<Json<PullRequestBody>, ApiError> {
    let params = query(params)?;
    let pr = state
        .services()
        .pull_requests
        .get_pr(&params.pull_request_id)
        .await
        .map_err(ApiError::pr)?;

    Ok(Json(pr.into()))
}

/// `GET /pullRequest/statistics`
pub async fn statistics(State(state): State<AppState>) -> Result<Json<StatsReport>, ApiError> {
    let report = state.services().pull_requests.get_stats().await?;
    Ok(Json(report))
}
