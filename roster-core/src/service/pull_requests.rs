//! Pull request lifecycle: create, merge, reassign, fetch
//!
//! States are `OPEN -> MERGED`, with `MERGED` terminal. State-changing writes
//! go through compare-and-set store operations or a single store unit of work,
//! so correctness does not depend on this service holding any lock between
//! its reads and writes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{PullRequest, Reassignment};
use crate::selector::ReviewerSelector;
use crate::stats::{StatsAggregator, StatsReport};
use crate::store::EntityStore;
use crate::{Error, Result};

/// Reviewers assigned when a pull request is opened, unless configured otherwise
pub const DEFAULT_MAX_REVIEWERS: usize = 2;

/// Owns the pull request state machine and reviewer assignment
#[derive(Clone)]
pub struct PullRequestService {
    store: Arc<dyn EntityStore>,
    selector: ReviewerSelector,
    stats: StatsAggregator,
    max_reviewers: usize,
}

impl PullRequestService {
    pub fn new(store: Arc<dyn EntityStore>, selector: ReviewerSelector) -> Self {
        Self {
            stats: StatsAggregator::new(store.clone()),
            store,
            selector,
            max_reviewers: DEFAULT_MAX_REVIEWERS,
        }
    }

    /// Override the number of reviewers assigned on create
    pub fn with_max_reviewers(mut self, max_reviewers: usize) -> Self {
        self.max_reviewers = max_reviewers;
        self
    }

    pub fn max_reviewers(&self) -> usize {
        self.max_reviewers
    }

    /// Open a pull request and assign reviewers from the author's team
    ///
    /// Picks up to `max_reviewers` active teammates other than the author.
    /// A team with fewer eligible members yields fewer reviewers, possibly
    /// none; that is not an error.
    pub async fn create_pr(&self, pr_id: &str, name: &str, author_id: &str) -> Result<PullRequest> {
        let author = self.store.get_user(author_id).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(format!("author {}", author_id)),
            e => e,
        })?;

        if self.store.pr_exists(pr_id).await? {
            return Err(Error::Conflict(format!(
                "pull request {} already exists",
                pr_id
            )));
        }

        let candidates = self
            .store
            .get_active_team_members(&author.team_name, std::slice::from_ref(&author.user_id))
            .await?;
        let reviewers = self.selector.select(&candidates, self.max_reviewers)?;

        let reviewer_ids: Vec<String> = reviewers.into_iter().map(|u| u.user_id).collect();
        let pr = PullRequest::new(pr_id, name, author_id, reviewer_ids);

        self.store.create_pr(&pr).await?;

        info!(
            pr_id = %pr.id,
            author = %pr.author_id,
            team = %author.team_name,
            reviewers = ?pr.assigned_reviewers,
            candidates = candidates.len(),
            "Pull request created"
        );

        Ok(pr)
    }

    /// Merge a pull request
    ///
    /// Merging an already merged pull request returns it unchanged. When two
    /// merges race, the store transition happens once and both callers get
    /// the merged record.
    pub async fn merge_pr(&self, pr_id: &str) -> Result<PullRequest> {
        let pr = self.store.get_pr(pr_id).await?;

        if pr.is_merged() {
            debug!(pr_id = %pr_id, "Pull request already merged");
            return Ok(pr);
        }

        if self.store.merge_pr(pr_id, Utc::now()).await? {
            info!(pr_id = %pr_id, "Pull request merged");
        } else {
            warn!(pr_id = %pr_id, "Pull request merged concurrently by another request");
        }

        self.store.get_pr(pr_id).await
    }

    /// Replace one reviewer with a random active teammate of theirs
    ///
    /// The replacement is drawn from the old reviewer's team, excluding the
    /// author and everyone already assigned. The new reviewer takes the old
    /// reviewer's slot.
    pub async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment> {
        let outcome = self
            .store
            .reassign_reviewer(pr_id, old_reviewer_id, &self.selector)
            .await?;

        info!(
            pr_id = %pr_id,
            old_reviewer = %old_reviewer_id,
            new_reviewer = %outcome.replaced_by,
            "Reviewer reassigned"
        );

        Ok(outcome)
    }

    pub async fn get_pr(&self, pr_id: &str) -> Result<PullRequest> {
        self.store.get_pr(pr_id).await
    }

    /// Review-load statistics
    pub async fn get_stats(&self) -> Result<StatsReport> {
        self.stats.get_stats().await
    }
}
