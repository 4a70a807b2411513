//! `/team/*` routes

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;

use roster_core::models::{DeactivationSummary, Team};

use super::{body, query};
use crate::dto::{CreateTeamRequest, DeactivateTeamRequest, TeamQuery, TeamResponse};
use crate::error::ApiError;
use crate::AppState;

/// `POST /team/add`
pub async fn add_team(
    State(state): State<AppState>,
    payload: Result<Json<CreateTeamRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TeamResponse>), ApiError> {
    let req = body(payload)?;
    let team = state
        .services()
        .teams
        .create_team(&req.team_name, req.members)
        .await
        .map_err(ApiError::team)?;

    Ok((StatusCode::CREATED, Json(TeamResponse { team })))
}

/// `GET /team/get?team_name=`
pub async fn get_team(
    State(state): State<AppState>,
    params: Result<Query<TeamQuery>, QueryRejection>,
) -> Result<Json<Team>, ApiError> {
    let params = query(params)?;
    let team = state
        .services()
        .teams
        .get_team(&params.team_name)
        .await
        .map_err(ApiError::team)?;

    Ok(Json(team))
}

/// `POST /team/deactivate`
pub async fn deactivate_team(
    State(state): State<AppState>,
    payload: Result<Json<DeactivateTeamRequest>, JsonRejection>,
) -> Result<Json<DeactivationSummary>, ApiError> {
    let req = body(payload)?;
    let summary = state
        .services()
        .teams
        .bulk_deactivate(&req.team_name)
        .await
        .map_err(ApiError::team)?;

    Ok(Json(summary))
}
