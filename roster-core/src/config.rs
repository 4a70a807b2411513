//! Configuration management for Roster
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (ROSTER_*)
//! 3. Config file (~/.config/roster/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Database-related configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: PathBuf,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// How many times to try connecting before giving up
    pub connect_attempts: u32,

    /// Pause between connection attempts
    #[serde(with = "humantime_serde")]
    pub connect_backoff: Duration,

    /// Maximum wait for a pooled connection
    #[serde(with = "humantime_serde")]
    pub acquire_timeout: Duration,

    /// Maximum wait on a locked database
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: 5,
            connect_attempts: 10,
            connect_backoff: Duration::from_secs(2),
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub listen: String,

    /// Upper bound on a single request, store work included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Grace period for in-flight requests on shutdown
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            request_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Reviewer assignment policy
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Reviewers assigned when a pull request is opened
    pub max_reviewers: usize,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { max_reviewers: 2 }
    }
}

/// Team roster policy
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// Reject creating a team whose name is already on record
    pub reject_existing: bool,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub review: ReviewConfig,
    pub teams: TeamsConfig,
}

/// `~/.local/share/roster/roster.db` on Linux
fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roster")
        .join("roster.db")
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/roster/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("roster").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - ROSTER_DATABASE_PATH: SQLite database file
    /// - ROSTER_LISTEN: server listen address
    /// - ROSTER_MAX_REVIEWERS: reviewers assigned per pull request
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var("ROSTER_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }

        if let Ok(listen) = std::env::var("ROSTER_LISTEN") {
            self.server.listen = listen;
        }

        if let Ok(max) = std::env::var("ROSTER_MAX_REVIEWERS") {
            self.review.max_reviewers = max.parse().map_err(|e| {
                Error::Config(format!("ROSTER_MAX_REVIEWERS must be an integer: {}", e))
            })?;
        }

        Ok(self)
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        database_path: Option<PathBuf>,
        listen: Option<String>,
    ) -> Self {
        if let Some(path) = database_path {
            self.database.path = path;
        }

        if let Some(listen) = listen {
            self.server.listen = listen;
        }

        self
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.review.max_reviewers == 0 {
            return Err(Error::Config(
                "review.max_reviewers must be at least 1".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.database.connect_attempts == 0 {
            return Err(Error::Config(
                "database.connect_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults. An explicit
    /// `config_path` replaces the default file location.
    pub fn load_with_overrides(
        config_path: Option<&Path>,
        database_path: Option<PathBuf>,
        listen: Option<String>,
    ) -> Result<Self> {
        let base = match config_path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::load()?,
        };
        let config = base
            .with_env_overrides()?
            .with_cli_overrides(database_path, listen);
        config.validate()?;
        Ok(config)
    }
}
