//! Redeploy confirmed workloads on the new backend (phase 2)

use chrono::Utc;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::model::{DeploymentBackend, Workload};
use crate::ports::{DeploymentHistoryStore, RedeployTrigger};

/// Result of a redeploy request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Redeploy {
    /// Deployment event submitted for this version
    Submitted {
        /// Workload version being deployed
        workload_version_id: i64,
    },
    /// The workload has never had a deployable version
    NothingToDeploy,
}

/// Stamps bookkeeping and submits the deployment event
pub struct Redeployer<'a> {
    history: &'a dyn DeploymentHistoryStore,
    trigger: &'a dyn RedeployTrigger,
}

impl<'a> Redeployer<'a> {
    /// Create a redeployer
    pub fn new(history: &'a dyn DeploymentHistoryStore, trigger: &'a dyn RedeployTrigger) -> Self {
        Self { history, trigger }
    }

    /// Submit the latest version of `workload` to `backend`.
    ///
    /// Only submission is awaited, not the deployment itself.
    pub async fn redeploy(
        &self,
        workload: &Workload,
        backend: DeploymentBackend,
        actor_id: i32,
    ) -> Result<Redeploy, StoreError> {
        let Some(version) = self.history.latest_version(workload.id).await? else {
            warn!(workload_id = workload.id, "No deployable version, skipping redeploy");
            return Ok(Redeploy::NothingToDeploy);
        };

        self.history
            .mark_deployed(&version, backend, actor_id, Utc::now())
            .await?;
        self.trigger
            .submit_deployment_event(version.id, backend, actor_id)
            .await?;

        info!(
            workload_id = workload.id,
            workload_version_id = version.id,
            backend = %backend,
            "Redeploy submitted"
        );
        Ok(Redeploy::Submitted {
            workload_version_id: version.id,
        })
    }
}
