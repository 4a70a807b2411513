//! Team management commands

use anyhow::bail;
use clap::{Args, Subcommand};
use roster_core::{Config, TeamMember};

use super::{open_services, print_json};

/// Team management commands
#[derive(Args, Debug)]
pub struct TeamArgs {
    #[command(subcommand)]
    pub command: TeamCommand,
}

#[derive(Subcommand, Debug)]
pub enum TeamCommand {
    /// Create a team or update its roster
    Add {
        /// Team name
        team_name: String,

        /// Member as `user_id:username`, optionally suffixed `:inactive`
        #[arg(short, long = "member", required = true)]
        members: Vec<String>,
    },

    /// Show a team and its members
    Get {
        /// Team name
        team_name: String,
    },

    /// Deactivate every member and strip their open reviews
    Deactivate {
        /// Team name
        team_name: String,
    },
}

impl TeamArgs {
    /// Execute the team command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (_db, services) = open_services(config).await?;

        match &self.command {
            TeamCommand::Add { team_name, members } => {
                let members = members
                    .iter()
                    .map(|member| parse_member(member))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                let team = services.teams.create_team(team_name, members).await?;
                print_json(&team)
            }
            TeamCommand::Get { team_name } => {
                print_json(&services.teams.get_team(team_name).await?)
            }
            TeamCommand::Deactivate { team_name } => {
                print_json(&services.teams.bulk_deactivate(team_name).await?)
            }
        }
    }
}

/// Parse `user_id:username[:inactive]`
fn parse_member(value: &str) -> anyhow::Result<TeamMember> {
    let parts: Vec<&str> = value.split(':').collect();
    match parts.as_slice() {
        [id, name] if !id.is_empty() && !name.is_empty() => Ok(TeamMember::new(*id, *name, true)),
        [id, name, "inactive"] if !id.is_empty() && !name.is_empty() => {
            Ok(TeamMember::new(*id, *name, false))
        }
        _ => bail!(
            "invalid member '{}', expected user_id:username[:inactive]",
            value
        ),
    }
}
