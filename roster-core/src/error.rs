//! Error types for Roster

use thiserror::Error;

/// Result type alias for Roster operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for Roster operations
///
/// Every failure a manager returns is one of these variants. Store backends
/// classify their own failures into this taxonomy before returning, so
/// transports can map errors without looking at backend details.
#[derive(Error, Debug)]
pub enum Error {
    /// Referenced pull request, user or team is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate id on create
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Operation is not legal in the current pull request state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reassignment target is not currently a reviewer
    #[error("Reviewer {reviewer_id} is not assigned to pull request {pr_id}")]
    NotAssigned { pr_id: String, reviewer_id: String },

    /// No eligible replacement reviewer
    #[error("No candidate: {0}")]
    NoCandidate(String),

    /// Store or randomness source failure
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`Error`], used by transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidState,
    NotAssigned,
    NoCandidate,
    Unavailable,
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::NotAssigned { .. } => ErrorKind::NotAssigned,
            Error::NoCandidate(_) => ErrorKind::NoCandidate,
            Error::Unavailable(_) => ErrorKind::Unavailable,
            Error::Config(_) | Error::Io(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a pull request lookup miss
    pub fn pr_not_found(pr_id: &str) -> Self {
        Error::NotFound(format!("pull request {}", pr_id))
    }

    /// Shorthand for a user lookup miss
    pub fn user_not_found(user_id: &str) -> Self {
        Error::NotFound(format!("user {}", user_id))
    }

    /// No active teammate left to take over a review
    pub fn no_candidate(team_name: &str) -> Self {
        Error::NoCandidate(format!(
            "no active replacement candidate in team {}",
            team_name
        ))
    }

    /// Shorthand for a team lookup miss
    pub fn team_not_found(team_name: &str) -> Self {
        Error::NotFound(format!("team {}", team_name))
    }
}
