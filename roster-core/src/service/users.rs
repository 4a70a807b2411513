//! User activation and review listings

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::{PullRequestShort, User};
use crate::store::EntityStore;
use crate::Result;

/// Pull requests a user is reviewing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReviews {
    pub user_id: String,
    /// Most recent first
    pub pull_requests: Vec<PullRequestShort>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Toggle the active flag
    ///
    /// Existing assignments are left alone; an inactive user is only skipped
    /// by future reviewer selection.
    pub async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User> {
        let user = self.store.set_user_active(user_id, is_active).await?;
        info!(user_id = %user_id, is_active, "User activation changed");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        self.store.get_user(user_id).await
    }

    pub async fn get_user_reviews(&self, user_id: &str) -> Result<UserReviews> {
        self.store.get_user(user_id).await?;
        let pull_requests = self.store.get_user_review_prs(user_id).await?;

        Ok(UserReviews {
            user_id: user_id.to_string(),
            pull_requests,
        })
    }
}
