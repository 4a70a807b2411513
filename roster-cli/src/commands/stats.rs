//! Review-load statistics command

use clap::Args;
use roster_core::Config;

use super::{open_services, print_json};

/// Show review load per active user and pull request totals
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Only show the N heaviest reviewers
    #[arg(short, long)]
    pub top: Option<usize>,
}

impl StatsArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let (_db, services) = open_services(config).await?;
        let mut report = services.pull_requests.get_stats().await?;

        if let Some(top) = self.top {
            report.user_stats.truncate(top);
        }
        print_json(&report)
    }
}
