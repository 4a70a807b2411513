//! Failure responses
//!
//! Every failure is rendered as `{"error": {"code": "...", "message": "..."}}`.

use std::time::Duration;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use roster_core::{Error as CoreError, ErrorKind};

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body, missing parameter or failed field validation
    #[error("{0}")]
    InvalidRequest(String),

    /// No route matches the request path
    #[error("no route for {0}")]
    UnknownRoute(String),

    /// The request ran past its deadline and was abandoned
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Failure reported by a manager
    ///
    /// `conflict_code` names the resource that already exists, since the
    /// same `Conflict` kind is used for teams and pull requests.
    #[error("{source}")]
    Service {
        source: CoreError,
        conflict_code: &'static str,
    },
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidRequest(message.into())
    }

    /// Wrap a team operation failure
    pub fn team(source: CoreError) -> Self {
        ApiError::Service {
            source,
            conflict_code: "TEAM_EXISTS",
        }
    }

    /// Wrap a pull request operation failure
    pub fn pr(source: CoreError) -> Self {
        ApiError::Service {
            source,
            conflict_code: "PR_EXISTS",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownRoute(_) => StatusCode::NOT_FOUND,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Service { source, .. } => match source.kind() {
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict
                | ErrorKind::InvalidState
                | ErrorKind::NotAssigned
                | ErrorKind::NoCandidate => StatusCode::CONFLICT,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "INVALID_REQUEST",
            ApiError::UnknownRoute(_) => "NOT_FOUND",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::Service {
                source,
                conflict_code,
            } => match source.kind() {
                ErrorKind::NotFound => "NOT_FOUND",
                ErrorKind::Conflict => conflict_code,
                ErrorKind::InvalidState => "PR_MERGED",
                ErrorKind::NotAssigned => "NOT_ASSIGNED",
                ErrorKind::NoCandidate => "NO_CANDIDATE",
                ErrorKind::Unavailable => "UNAVAILABLE",
                ErrorKind::Internal => "INTERNAL_ERROR",
            },
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(source: CoreError) -> Self {
        ApiError::Service {
            source,
            conflict_code: "CONFLICT",
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

/// Wire shape of a failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
