//! Review-load statistics
//!
//! Statistics are derived from stored assignments on every call and never
//! mutate state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{PrCounts, ReviewStat};
use crate::store::EntityStore;
use crate::Result;

/// Review load for every active user plus pull request totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    /// One entry per active user, heaviest review load first
    pub user_stats: Vec<ReviewStat>,
    pub pull_requests: PrCounts,
}

/// Order by total reviews descending, then user id ascending
pub fn rank(stats: &mut [ReviewStat]) {
    stats.sort_by(|a, b| {
        b.total_prs
            .cmp(&a.total_prs)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
}

/// Computes review-load statistics from the store
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn EntityStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn get_stats(&self) -> Result<StatsReport> {
        let mut user_stats = self.store.get_review_stats().await?;
        rank(&mut user_stats);

        let pull_requests = self.store.get_pr_counts().await?;
        debug!(
            users = user_stats.len(),
            total_prs = pull_requests.total_prs,
            "Computed review statistics"
        );

        Ok(StatsReport {
            user_stats,
            pull_requests,
        })
    }
}
