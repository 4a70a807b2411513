//! User commands

use clap::{Args, Subcommand};
use roster_core::Config;

use super::{open_services, print_json};

/// User commands
#[derive(Args, Debug)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Mark a user active or inactive
    SetActive {
        /// User id
        user_id: String,

        /// New active flag
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },

    /// List the pull requests a user reviews
    Reviews {
        /// User id
        user_id: String,
    },
}

impl UserArgs {
    /// Execute the user command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (_db, services) = open_services(config).await?;

        match &self.command {
            UserCommand::SetActive { user_id, active } => {
                print_json(&services.users.set_user_active(user_id, *active).await?)
            }
            UserCommand::Reviews { user_id } => {
                print_json(&services.users.get_user_reviews(user_id).await?)
            }
        }
    }
}
