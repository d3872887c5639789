//! Confirm the old backend let go of a workload (phase 2)

use tracing::debug;

use crate::accumulator::Outcome;
use crate::backend::BackendAdapter;
use crate::error::BackendError;
use crate::model::{MigrationStatus, Workload};

/// Checks a workload's continued existence on its old backend
pub struct CompletionVerifier<'a> {
    old_backend: &'a dyn BackendAdapter,
}

impl<'a> CompletionVerifier<'a> {
    /// Create a verifier over the backend being migrated away from
    pub fn new(old_backend: &'a dyn BackendAdapter) -> Self {
        Self { old_backend }
    }

    /// `Success` once the old backend no longer has the workload
    pub async fn verify(&self, workload: &Workload) -> Outcome {
        let backend = self.old_backend.kind();
        match self.old_backend.exists(workload).await {
            Ok(false) | Err(BackendError::NotFound(_)) => {
                debug!(workload_id = workload.id, backend = %backend, "Old backend confirmed empty");
                Outcome::Succeeded(MigrationStatus::Success)
            }
            Ok(true) => {
                let state = match self.old_backend.status(workload).await {
                    Ok(status) => format!(" (state: {})", status.state),
                    Err(_) => String::new(),
                };
                Outcome::failed_with(
                    MigrationStatus::NotYetDeleted,
                    format!("{} still present on {}{}", workload.release_name(), backend, state),
                )
            }
            Err(BackendError::PermissionDenied(msg)) => Outcome::failed_with(
                MigrationStatus::PermissionDenied,
                format!("permission denied checking {}: {}", backend, msg),
            ),
            Err(e) => Outcome::failed_with(
                MigrationStatus::NotYetDeleted,
                format!("could not confirm deletion from {}: {}", backend, e),
            ),
        }
    }
}
