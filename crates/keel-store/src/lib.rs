//! PostgreSQL persistence for keel
//!
//! [`PgStore`] implements every persistence port of the migration engine
//! over one connection pool. Each method runs its own statement or
//! transaction; nothing spans workloads.

#![deny(missing_docs)]

mod configs;
pub mod error;
mod health;
mod history;
pub mod migrations;
mod rows;
mod workloads;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub use error::Error;

/// Default pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(Error::Connect)?;
        info!(max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    /// Underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether an active GitOps repository is configured
    pub async fn gitops_repository_configured(&self) -> Result<bool, keel_migrate::StoreError> {
        let (configured,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM gitops_config
                WHERE active AND COALESCE(repository_url, '') <> ''
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(error::db_err)?;
        Ok(configured)
    }
}
