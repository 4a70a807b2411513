//! Domain records for teams, users and pull requests

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Pull request status
///
/// `Open` is the only non-terminal state; there is no transition out of `Merged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(PrStatus::Open),
            "MERGED" => Ok(PrStatus::Merged),
            other => Err(Error::Unavailable(format!(
                "unknown pull request status '{}'",
                other
            ))),
        }
    }
}

/// A user; belongs to exactly one team at a time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl User {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        team_name: impl Into<String>,
        is_active: bool,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            team_name: team_name.into(),
            is_active,
        }
    }
}

/// Team member as listed in a team roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

impl TeamMember {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active,
        }
    }

    /// Materialize this member as a user of `team_name`
    pub fn to_user(&self, team_name: &str) -> User {
        User::new(&self.user_id, &self.username, team_name, self.is_active)
    }
}

impl From<User> for TeamMember {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            is_active: user.is_active,
        }
    }
}

/// A team and its members, ordered by user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl Team {
    pub fn new(team_name: impl Into<String>, members: Vec<TeamMember>) -> Self {
        Self {
            team_name: team_name.into(),
            members,
        }
    }
}

/// Pull request with its reviewer set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
    /// Reviewer ids in assignment-slot order
    pub assigned_reviewers: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Create a new open pull request
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        author_id: impl Into<String>,
        assigned_reviewers: Vec<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            author_id: author_id.into(),
            status: PrStatus::Open,
            assigned_reviewers,
            created_at: Utc::now(),
            merged_at: None,
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }

    pub fn has_reviewer(&self, user_id: &str) -> bool {
        self.assigned_reviewers.iter().any(|r| r == user_id)
    }

    /// Position of `reviewer_id` in the reviewer list, if it may be swapped out
    ///
    /// Fails with `InvalidState` once merged and `NotAssigned` if the user is
    /// not reviewing.
    pub fn reassignable_slot(&self, reviewer_id: &str) -> Result<usize, Error> {
        if self.is_merged() {
            return Err(Error::InvalidState(format!(
                "cannot reassign on merged pull request {}",
                self.id
            )));
        }

        self.assigned_reviewers
            .iter()
            .position(|r| r == reviewer_id)
            .ok_or_else(|| Error::NotAssigned {
                pr_id: self.id.clone(),
                reviewer_id: reviewer_id.to_string(),
            })
    }

    /// Ids a replacement reviewer must not be drawn from
    pub fn reassignment_exclusions(&self) -> Vec<String> {
        let mut exclude = self.assigned_reviewers.clone();
        exclude.push(self.author_id.clone());
        exclude
    }

    pub fn to_short(&self) -> PullRequestShort {
        PullRequestShort {
            id: self.id.clone(),
            name: self.name.clone(),
            author_id: self.author_id.clone(),
            status: self.status,
        }
    }
}

/// Result of a successful reviewer reassignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub pr: PullRequest,
    /// Id of the reviewer that took over the slot
    pub replaced_by: String,
}

/// Pull request summary without reviewers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    pub id: String,
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
}

/// Review load for one active user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStat {
    pub user_id: String,
    pub open_prs: i64,
    pub total_prs: i64,
}

/// Pull request totals across the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrCounts {
    pub total_prs: i64,
    pub open_prs: i64,
    pub merged_prs: i64,
}

/// Outcome of a bulk team deactivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationSummary {
    pub team_name: String,
    pub users_deactivated: u64,
    pub assignments_removed: u64,
}
