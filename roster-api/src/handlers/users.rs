//! `/users/*` routes

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;

use super::{body, query};
use crate::dto::{SetIsActiveRequest, UserQuery, UserResponse, UserReviewsResponse};
use crate::error::ApiError;
use crate::AppState;

/// `POST /users/setIsActive`
pub async fn set_is_active(
    State(state): State<AppState>,
    payload: Result<Json<SetIsActiveRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let req = body(payload)?;
    let user = state
        .services()
        .users
        .set_user_active(&req.user_id, req.is_active)
        .await?;

    Ok(Json(UserResponse { user }))
}

/// `GET /users/getReview?user_id=`
pub async fn get_review(
    State(state): State<AppState>,
    params: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserReviewsResponse>, ApiError> {
    let params = query(params)?;
    let reviews = state
        .services()
        .users
        .get_user_reviews(&params.user_id)
        .await?;

    Ok(Json(reviews.into()))
}
