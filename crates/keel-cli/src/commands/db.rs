//! `keel db` - schema management

use clap::Subcommand;
use tracing::info;

use keel_store::PgStore;

use crate::Result;

#[derive(Subcommand, Debug)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate,
}

pub async fn run(command: DbCommand, database_url: &str) -> Result<()> {
    match command {
        DbCommand::Migrate => {
            let store = PgStore::connect(database_url, 1).await?;
            store.migrate().await?;
            info!("Schema is up to date");
            Ok(())
        }
    }
}
