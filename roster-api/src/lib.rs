//! HTTP interface for Roster
//!
//! Thin transport over the managers in `roster-core`: parses and validates
//! requests, calls one manager operation, shapes the JSON response and maps
//! failures to status codes.
//!
//! # Endpoints
//!
//! - `POST /team/add`, `GET /team/get`, `POST /team/deactivate`
//! - `POST /users/setIsActive`, `GET /users/getReview`
//! - `POST /pullRequest/create`, `POST /pullRequest/merge`,
//!   `POST /pullRequest/reassign`, `GET /pullRequest/get`,
//!   `GET /pullRequest/statistics`
//! - `GET /health`

use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{get, post};
use axum::{BoxError, Router};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use roster_core::Services;

pub mod dto;
pub mod error;
pub mod handlers;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use handlers::health::health_handler;

/// Default per-request deadline
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared application state, passed to handlers via axum's `State` extractor
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    services: Services,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        Self::with_request_timeout(services, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Requests running longer than `request_timeout` are abandoned; their
    /// store work is dropped and rolled back.
    pub fn with_request_timeout(services: Services, request_timeout: Duration) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                services,
                request_timeout,
            }),
        }
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    pub fn request_timeout(&self) -> Duration {
        self.inner.request_timeout
    }
}

/// Builds the axum Router with all endpoints
pub fn build_router(app_state: AppState) -> Router {
    use handlers::{pull_requests, teams, users};

    let timeout = app_state.request_timeout();

    let router = Router::new()
        .route("/team/add", post(teams::add_team))
        .route("/team/get", get(teams::get_team))
        .route("/team/deactivate", post(teams::deactivate_team))
        .route("/users/setIsActive", post(users::set_is_active))
        .route("/users/getReview", get(users::get_review))
        .route("/pullRequest/create", post(pull_requests::create_pr))
        .route("/pullRequest/merge", post(pull_requests::merge_pr))
        .route("/pullRequest/reassign", post(pull_requests::reassign))
        .route("/pullRequest/get", get(pull_requests::get_pr))
        .route("/pullRequest/statistics", get(pull_requests::statistics))
        .route("/health", get(health_handler))
        .fallback(handlers::unknown_route)
        .with_state(app_state);

    with_request_layers(router, timeout)
}

/// Tracing plus a per-request deadline; an expired request answers with an
/// `ApiError` body and its handler future is dropped
fn with_request_layers(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                handlers::middleware_error(err, timeout)
            }))
            .layer(TimeoutLayer::new(timeout)),
    )
}
