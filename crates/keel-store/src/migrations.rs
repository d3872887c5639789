//! Embedded schema migrations

use sqlx::migrate::Migrator;
use tracing::info;

use crate::{Error, PgStore};

/// Migrator with every schema migration embedded
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

impl PgStore {
    /// Apply pending migrations; already applied ones are skipped
    pub async fn migrate(&self) -> Result<(), Error> {
        MIGRATOR.run(&self.pool).await?;
        info!("Database schema up to date");
        Ok(())
    }
}
