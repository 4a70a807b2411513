//! CLI command implementations

pub mod pr;
pub mod serve;
pub mod stats;
pub mod team;
pub mod user;

pub use pr::PrArgs;
pub use stats::StatsArgs;
pub use team::TeamArgs;
pub use user::UserArgs;

use std::sync::Arc;

use roster_core::{Config, ReviewerSelector, Services};
use roster_db::Database;
use serde::Serialize;

/// Open the configured database, migrate it and wire the managers
pub(crate) async fn open_services(config: &Config) -> anyhow::Result<(Database, Services)> {
    let db = Database::open(&config.database).await?;
    let services = Services::new(Arc::new(db.store()), ReviewerSelector::secure(), config);
    Ok((db, services))
}

/// Pretty-print a result as JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
