//! `keel migrate` - phase 1
//!
//! Deletes the selected workloads from their current backend and points
//! their deployment config at the new one.

use std::path::Path;

use clap::Args;
use tracing::info;

use keel_migrate::MigrationError;

use super::{build_migrator, cancel_on_ctrl_c, report, SelectionArgs};
use crate::Result;

/// Start moving workloads to another backend
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,
}

pub async fn run(args: MigrateArgs, config: &Path, database_url: &str) -> Result<()> {
    let migrator = build_migrator(config, database_url, args.selection.concurrency).await?;
    let request = args.selection.request();
    let cancel = cancel_on_ctrl_c();

    match migrator.migrate_deployment_type(&request, &cancel).await {
        Ok(response) => {
            info!(
                succeeded = response.successful_workloads.len(),
                failed = response.failed_workloads.len(),
                "Deletion phase finished, run `keel trigger` to redeploy"
            );
            report(&response)
        }
        Err(MigrationError::ConfigReconcile { failures, response }) => {
            // Deletions already happened, so the partition is still worth printing
            report(&response).ok();
            Err(MigrationError::ConfigReconcile { failures, response }.into())
        }
        Err(e) => Err(e.into()),
    }
}
