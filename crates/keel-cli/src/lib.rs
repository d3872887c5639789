//! keel CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use keel_common::telemetry::LogFormat;

/// keel - move workloads between Helm and Argo CD
#[derive(Parser, Debug)]
#[command(name = "keel")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the keel YAML config
    #[arg(long, global = true, env = "KEEL_CONFIG", default_value = "keel.yaml")]
    pub config: PathBuf,

    /// PostgreSQL connection string
    #[arg(long, global = true, env = "KEEL_DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Log output (`text` or `json`)
    #[arg(long, global = true, env = "KEEL_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete workloads from their current backend and flip their config
    Migrate(commands::migrate::MigrateArgs),
    /// Verify deletion and redeploy on the new backend
    Trigger(commands::trigger::TriggerArgs),
    /// Database management
    #[command(subcommand)]
    Db(commands::db::DbCommand),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let database_url = self
            .database_url
            .ok_or_else(|| Error::validation("--database-url or KEEL_DATABASE_URL is required"))?;

        match self.command {
            Commands::Migrate(args) => {
                commands::migrate::run(args, &self.config, &database_url).await
            }
            Commands::Trigger(args) => {
                commands::trigger::run(args, &self.config, &database_url).await
            }
            Commands::Db(command) => commands::db::run(command, &database_url).await,
        }
    }
}
