//! Roster Core - Core library for Roster team review assignment
//!
//! This crate provides the domain model, the storage contract and the
//! managers that assign reviewers to pull requests, drive the pull request
//! state machine, keep team deactivation consistent and report review load.

pub mod config;
pub mod error;
pub mod models;
pub mod selector;
pub mod service;
pub mod stats;
pub mod store;

pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use models::{
    DeactivationSummary, PrCounts, PrStatus, PullRequest, PullRequestShort, Reassignment,
    ReviewStat, Team, TeamMember, User,
};
pub use selector::{OsRandom, RandomSource, ReviewerSelector, SeededRandom};
pub use service::{PullRequestService, Services, TeamService, UserReviews, UserService};
pub use stats::{StatsAggregator, StatsReport};
pub use store::{EntityStore, MemoryStore};
