//! Store abstraction for teams, users and pull requests.
//!
//! This module defines the `EntityStore` trait that abstracts storage
//! operations for the managers. Implementations provide different
//! backends (in-memory here, SQLite in `roster-db`).
//!
//! Every operation is its own unit of work: multi-row writes (creating a
//! pull request with its assignments, upserting a team roster, bulk
//! deactivation) commit together or not at all. Dropping the returned
//! future before it resolves must leave the store unchanged.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    DeactivationSummary, PrCounts, PullRequest, PullRequestShort, Reassignment, ReviewStat, Team,
    User,
};
use crate::selector::ReviewerSelector;
use crate::Result;

/// Storage contract consumed by the managers.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // =========================================================================
    // Pull requests
    // =========================================================================

    /// Insert a pull request and all of its reviewer assignments.
    ///
    /// Fails with `Conflict` if the id already exists.
    async fn create_pr(&self, pr: &PullRequest) -> Result<()>;

    async fn pr_exists(&self, pr_id: &str) -> Result<bool>;

    /// Fetch a pull request with reviewers in assignment-slot order.
    async fn get_pr(&self, pr_id: &str) -> Result<PullRequest>;

    /// Transition `OPEN -> MERGED`, stamping `merged_at`.
    ///
    /// Conditioned on the stored status still being `OPEN`. Returns `true`
    /// if this call performed the transition and `false` if the pull request
    /// was already merged. Fails with `NotFound` if it does not exist.
    async fn merge_pr(&self, pr_id: &str, merged_at: DateTime<Utc>) -> Result<bool>;

    /// Replace the whole assignment set of a pull request.
    async fn update_pr_reviewers(&self, pr_id: &str, reviewer_ids: &[String]) -> Result<()>;

    /// Swap `old_reviewer_id` for a random active teammate of theirs.
    ///
    /// One unit of work that holds the pull request's write lock from the
    /// first read to the swap: the reviewer set, the candidate pool and the
    /// update all see the same state, so concurrent reassignments on one pull
    /// request serialize. The replacement comes from the old reviewer's team,
    /// excluding the author and every current reviewer, and takes the old
    /// reviewer's slot.
    ///
    /// Fails with `NotFound` for an unknown pull request or reviewer,
    /// `InvalidState` once merged, `NotAssigned` if the reviewer is not on the
    /// pull request and `NoCandidate` if nobody is eligible.
    async fn reassign_reviewer(
        &self,
        pr_id: &str,
        old_reviewer_id: &str,
        selector: &ReviewerSelector,
    ) -> Result<Reassignment>;

    /// Raw per-user review counts for every active user.
    async fn get_review_stats(&self) -> Result<Vec<ReviewStat>>;

    async fn get_pr_counts(&self) -> Result<PrCounts>;

    // =========================================================================
    // Users
    // =========================================================================

    /// Insert or update a user by id.
    async fn create_or_update_user(&self, user: &User) -> Result<()>;

    async fn get_user(&self, user_id: &str) -> Result<User>;

    /// Set the active flag and return the refreshed user.
    async fn set_user_active(&self, user_id: &str, is_active: bool) -> Result<User>;

    /// Active members of `team_name` minus `exclude_ids`, ordered by id.
    async fn get_active_team_members(
        &self,
        team_name: &str,
        exclude_ids: &[String],
    ) -> Result<Vec<User>>;

    /// Pull requests the user reviews, most recent first.
    async fn get_user_review_prs(&self, user_id: &str) -> Result<Vec<PullRequestShort>>;

    // =========================================================================
    // Teams
    // =========================================================================

    /// Upsert the team and every member.
    async fn create_team(&self, team: &Team) -> Result<()>;

    /// Insert a new team and upsert its members.
    ///
    /// Fails with `Conflict`, writing nothing, if the team is already on
    /// record. The existence check and the writes are one unit of work.
    async fn insert_team(&self, team: &Team) -> Result<()>;

    async fn team_exists(&self, team_name: &str) -> Result<bool>;

    /// Fails with `NotFound` if the team has no members on record.
    async fn get_team(&self, team_name: &str) -> Result<Team>;

    /// Strip the members' assignments on open pull requests, then deactivate
    /// every member. Both steps commit together.
    async fn bulk_deactivate_users(&self, team_name: &str) -> Result<DeactivationSummary>;
}
