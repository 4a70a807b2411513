//! Managers for the pull request lifecycle, team rosters and users
//!
//! Managers hold no mutable state of their own; everything shared lives in
//! the [`EntityStore`]. They are cheap to clone and safe to call concurrently.

pub mod pull_requests;
pub mod teams;
pub mod users;

pub use pull_requests::{PullRequestService, DEFAULT_MAX_REVIEWERS};
pub use teams::TeamService;
pub use users::{UserReviews, UserService};

use std::sync::Arc;

use crate::config::Config;
use crate::selector::ReviewerSelector;
use crate::store::EntityStore;

/// All managers wired to one store
#[derive(Clone)]
pub struct Services {
    pub pull_requests: PullRequestService,
    pub teams: TeamService,
    pub users: UserService,
}

impl Services {
    pub fn new(store: Arc<dyn EntityStore>, selector: ReviewerSelector, config: &Config) -> Self {
        Self {
            pull_requests: PullRequestService::new(store.clone(), selector)
                .with_max_reviewers(config.review.max_reviewers),
            teams: TeamService::new(store.clone())
                .with_reject_existing(config.teams.reject_existing),
            users: UserService::new(store),
        }
    }
}
