//! Database layer for Roster
//!
//! Provides SQLite persistence for teams, users, pull requests and reviewer
//! assignments behind the `EntityStore` contract from `roster-core`.

pub mod error;
pub mod store;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use tracing::{debug, info, warn};

use roster_core::config::DatabaseConfig;

pub use error::{DbError, Result};
pub use store::SqliteStore;

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database described by `config`, retrying while it is unreachable
    ///
    /// Makes up to `connect_attempts` tries, sleeping `connect_backoff`
    /// between them. Migrations are not run; call [`Database::migrate`].
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout)
            .disable_statement_logging();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .connect_with(options.clone())
                .await;

            match result {
                Ok(pool) => {
                    info!(path = %config.path.display(), attempt, "Connected to database");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < config.connect_attempts => {
                    warn!(
                        attempt,
                        max_attempts = config.connect_attempts,
                        error = %e,
                        "Database not reachable, retrying in {:?}",
                        config.connect_backoff
                    );
                    tokio::time::sleep(config.connect_backoff).await;
                }
                Err(e) => {
                    return Err(DbError::Connect {
                        path: config.path.display().to_string(),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Connect and bring the schema up to date
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let db = Self::connect(config).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("Database migrations applied");
        Ok(())
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get an entity store over this pool
    pub fn store(&self) -> SqliteStore {
        SqliteStore::new(self.pool.clone())
    }

    /// Close every pooled connection
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
