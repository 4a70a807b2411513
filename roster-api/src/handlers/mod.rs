//! Route handlers, one module per resource

pub mod health;
pub mod pull_requests;
pub mod teams;
pub mod users;

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::Query;
use axum::http::Uri;
use axum::{BoxError, Json};
use tower::timeout::error::Elapsed;
use tracing::warn;

use crate::dto::Validate;
use crate::error::ApiError;

/// Unwrap and validate a JSON body
pub(crate) fn body<T: Validate>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(body) = payload?;
    body.validate()?;
    Ok(body)
}

/// Unwrap and validate query parameters
pub(crate) fn query<T: Validate>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    let Query(params) = params?;
    params.validate()?;
    Ok(params)
}

/// Answer for paths no route matches
pub(crate) async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::UnknownRoute(uri.path().to_string())
}

/// Map a failure raised by the middleware stack to an `ApiError`
pub(crate) fn middleware_error(err: BoxError, timeout: Duration) -> ApiError {
    if err.is::<Elapsed>() {
        warn!(timeout = ?timeout, "Request timed out");
        ApiError::Timeout(timeout)
    } else {
        ApiError::from(roster_core::Error::Unavailable(err.to_string()))
    }
}
