//! Pull request commands

use clap::{Args, Subcommand};
use roster_core::Config;

use super::{open_services, print_json};

/// Pull request commands
#[derive(Args, Debug)]
pub struct PrArgs {
    #[command(subcommand)]
    pub command: PrCommand,
}

#[derive(Subcommand, Debug)]
pub enum PrCommand {
    /// Open a pull request and assign reviewers from the author's team
    Create {
        /// Pull request id
        pull_request_id: String,

        /// Pull request title
        #[arg(short, long)]
        name: String,

        /// Author user id
        #[arg(short, long)]
        author: String,
    },

    /// Merge a pull request (no-op if already merged)
    Merge {
        /// Pull request id
        pull_request_id: String,
    },

    /// Replace a reviewer with a random active teammate
    Reassign {
        /// Pull request id
        pull_request_id: String,

        /// Reviewer to replace
        old_reviewer_id: String,
    },

    /// Show a pull request
    Get {
        /// Pull request id
        pull_request_id: String,
    },
}

impl PrArgs {
    /// Execute the pull request command
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (_db, services) = open_services(config).await?;
        let prs = &services.pull_requests;

        match &self.command {
            PrCommand::Create {
                pull_request_id,
                name,
                author,
            } => print_json(&prs.create_pr(pull_request_id, name, author).await?),
            PrCommand::Merge { pull_request_id } => {
                print_json(&prs.merge_pr(pull_request_id).await?)
            }
            PrCommand::Reassign {
                pull_request_id,
                old_reviewer_id,
            } => print_json(
                &prs
                    .reassign_reviewer(pull_request_id, old_reviewer_id)
                    .await?,
            ),
            PrCommand::Get { pull_request_id } => print_json(&prs.get_pr(pull_request_id).await?),
        }
    }
}
