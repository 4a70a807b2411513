//! Roster CLI - Command line interface and server for Roster
//!
//! Assigns pull request reviewers from the author's team and tracks review load.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roster_core::Config;
use roster_db::Database;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{PrArgs, StatsArgs, TeamArgs, UserArgs};

/// Roster: pull request reviewer assignment for teams
#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/roster/config.toml)
    #[arg(short, long, global = true, env = "ROSTER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path (overrides config and env)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Listen address for `serve` (overrides config and env)
    #[arg(long, global = true)]
    listen: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show version information
    Version,

    /// Show current configuration
    Config,

    /// Create the database and apply schema migrations
    Migrate,

    /// Run the HTTP server
    #[command(visible_alias = "s")]
    Serve,

    /// Manage teams
    Team(TeamArgs),

    /// Manage users
    User(UserArgs),

    /// Manage pull requests
    Pr(PrArgs),

    /// Show review statistics
    Stats(StatsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    // Load configuration with overrides
    let config =
        Config::load_with_overrides(cli.config.as_deref(), cli.database.clone(), cli.listen.clone())?;

    if cli.verbose {
        tracing::info!(
            database = %config.database.path.display(),
            listen = %config.server.listen,
            max_reviewers = config.review.max_reviewers,
            "Configuration loaded"
        );
    }

    match cli.command {
        Some(Commands::Version) => {
            println!("roster {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Config) => {
            println!("Roster Configuration");
            println!("====================");
            println!();
            println!("Database:");
            println!("  path: {}", config.database.path.display());
            println!("  max_connections: {}", config.database.max_connections);
            println!(
                "  connect: {} attempts, {:?} apart",
                config.database.connect_attempts, config.database.connect_backoff
            );
            println!();
            println!("Server:");
            println!("  listen: {}", config.server.listen);
            println!("  request_timeout: {:?}", config.server.request_timeout);
            println!("  shutdown_timeout: {:?}", config.server.shutdown_timeout);
            println!();
            println!("Review:");
            println!("  max_reviewers: {}", config.review.max_reviewers);
            println!("  reject_existing_teams: {}", config.teams.reject_existing);
            println!();
            let path = cli.config.clone().or_else(Config::default_config_path);
            if let Some(path) = path {
                println!("Config file: {}", path.display());
                if path.exists() {
                    println!("  (exists)");
                } else {
                    println!("  (not found - using defaults)");
                }
            }
        }
        Some(Commands::Migrate) => {
            let db = Database::open(&config.database).await?;
            db.close().await;
            println!("Database ready at {}", config.database.path.display());
        }
        Some(Commands::Serve) => {
            commands::serve::execute(&config).await?;
        }
        Some(Commands::Team(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::User(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Pr(args)) => {
            args.execute(&config).await?;
        }
        Some(Commands::Stats(args)) => {
            args.execute(&config).await?;
        }
        None => {
            println!("Roster - pull request reviewer assignment for teams");
            println!();
            println!("Use --help for usage information");
        }
    }

    Ok(())
}
