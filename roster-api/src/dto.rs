//! Request and response bodies
//!
//! Field names follow the public wire format, which differs from the core
//! models in places (`pull_request_id`, `mergedAt`).

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use roster_core::models::{PullRequest, PullRequestShort, Team, TeamMember, User};
use roster_core::UserReviews;

use crate::error::ApiError;

/// Field-level validation for request bodies
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

fn require(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid(format!("{} is required", field)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Teams
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub members: Vec<TeamMember>,
}

impl Validate for CreateTeamRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("team_name", &self.team_name)?;
        if self.members.is_empty() {
            return Err(ApiError::invalid("members must not be empty"));
        }
        for member in &self.members {
            require("members[].user_id", &member.user_id)?;
            require("members[].username", &member.username)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamResponse {
    pub team: Team,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamQuery {
    pub team_name: String,
}

impl Validate for TeamQuery {
    fn validate(&self) -> Result<(), ApiError> {
        require("team_name", &self.team_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeactivateTeamRequest {
    pub team_name: String,
}

impl Validate for DeactivateTeamRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("team_name", &self.team_name)
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetIsActiveRequest {
    pub user_id: String,
    pub is_active: bool,
}

impl Validate for SetIsActiveRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("user_id", &self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
}

impl Validate for UserQuery {
    fn validate(&self) -> Result<(), ApiError> {
        require("user_id", &self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserReviewsResponse {
    pub user_id: String,
    pub pull_requests: Vec<PullRequestShortBody>,
}

impl From<UserReviews> for UserReviewsResponse {
    fn from(reviews: UserReviews) -> Self {
        Self {
            user_id: reviews.user_id,
            pull_requests: reviews.pull_requests.into_iter().map(Into::into).collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pull requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrRequest {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
}

impl Validate for CreatePrRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("pull_request_id", &self.pull_request_id)?;
        require("pull_request_name", &self.pull_request_name)?;
        require("author_id", &self.author_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePrRequest {
    pub pull_request_id: String,
}

impl Validate for MergePrRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("pull_request_id", &self.pull_request_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignRequest {
    pub pull_request_id: String,
    pub old_reviewer_id: String,
}

impl Validate for ReassignRequest {
    fn validate(&self) -> Result<(), ApiError> {
        require("pull_request_id", &self.pull_request_id)?;
        require("old_reviewer_id", &self.old_reviewer_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrQuery {
    pub pull_request_id: String,
}

impl Validate for PrQuery {
    fn validate(&self) -> Result<(), ApiError> {
        require("pull_request_id", &self.pull_request_id)
    }
}

/// Pull request as exposed on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestBody {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
    pub assigned_reviewers: Vec<String>,
    /// RFC 3339, present once merged
    #[serde(rename = "mergedAt", default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
}

impl From<PullRequest> for PullRequestBody {
    fn from(pr: PullRequest) -> Self {
        Self {
            status: pr.status.to_string(),
            merged_at: pr
                .merged_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            assigned_reviewers: pr.assigned_reviewers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShortBody {
    pub pull_request_id: String,
    pub pull_request_name: String,
    pub author_id: String,
    pub status: String,
}

impl From<PullRequestShort> for PullRequestShortBody {
    fn from(pr: PullRequestShort) -> Self {
        Self {
            pull_request_id: pr.id,
            pull_request_name: pr.name,
            author_id: pr.author_id,
            status: pr.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrResponse {
    pub pr: PullRequestBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReassignResponse {
    pub pr: PullRequestBody,
    pub replaced_by: String,
}
