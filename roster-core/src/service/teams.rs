//! Team rosters and bulk deactivation

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::models::{DeactivationSummary, Team, TeamMember};
use crate::store::EntityStore;
use crate::Result;

/// Owns team creation and the cross-entity deactivation operation
#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn EntityStore>,
    reject_existing: bool,
}

impl TeamService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self {
            store,
            reject_existing: false,
        }
    }

    /// Fail `create_team` with `Conflict` when the name is already on record
    pub fn with_reject_existing(mut self, reject_existing: bool) -> Self {
        self.reject_existing = reject_existing;
        self
    }

    /// Create a team, upserting every member
    ///
    /// Recreating an existing team updates its members; a member listed here
    /// moves to this team with the supplied username and active flag. A user
    /// listed twice keeps the last entry. The returned roster is ordered by
    /// user id, the same order `get_team` reports.
    pub async fn create_team(&self, team_name: &str, members: Vec<TeamMember>) -> Result<Team> {
        let members: BTreeMap<String, TeamMember> = members
            .into_iter()
            .map(|member| (member.user_id.clone(), member))
            .collect();
        let team = Team::new(team_name, members.into_values().collect());

        if self.reject_existing {
            self.store.insert_team(&team).await?;
        } else {
            self.store.create_team(&team).await?;
        }

        info!(team = %team.team_name, members = team.members.len(), "Team saved");
        Ok(team)
    }

    pub async fn get_team(&self, team_name: &str) -> Result<Team> {
        self.store.get_team(team_name).await
    }

    /// Deactivate every member of a team
    ///
    /// In one unit of work, strips the members from every open pull request
    /// they review and marks them inactive. Merged pull requests keep their
    /// reviewer history.
    pub async fn bulk_deactivate(&self, team_name: &str) -> Result<DeactivationSummary> {
        self.store.get_team(team_name).await?;

        let summary = self.store.bulk_deactivate_users(team_name).await?;
        info!(
            team = %team_name,
            users = summary.users_deactivated,
            assignments_removed = summary.assignments_removed,
            "Team deactivated"
        );

        Ok(summary)
    }
}
