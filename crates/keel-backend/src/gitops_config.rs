//! GitOps readiness as seen from the platform

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use keel_common::kube_utils::crd_exists;
use keel_common::ClusterRegistry;
use keel_migrate::model::GitOpsState;
use keel_migrate::ports::GitOpsConfigReader;
use keel_migrate::BackendError;

use crate::error::from_common;

/// CRD whose presence means Argo CD is installed
pub const APPLICATION_CRD: &str = "applications.argoproj.io";

/// [`GitOpsConfigReader`] combining the stored repository setting with the
/// Argo CD cluster's installed CRDs
pub struct ArgoCdConfigReader {
    clusters: Arc<ClusterRegistry>,
    cluster_id: i64,
    repository_configured: bool,
}

impl ArgoCdConfigReader {
    /// Argo CD runs on `cluster_id`; `repository_configured` comes from the
    /// platform's GitOps settings
    pub fn new(clusters: Arc<ClusterRegistry>, cluster_id: i64, repository_configured: bool) -> Self {
        Self {
            clusters,
            cluster_id,
            repository_configured,
        }
    }
}

#[async_trait]
impl GitOpsConfigReader for ArgoCdConfigReader {
    async fn is_configured(&self) -> Result<GitOpsState, BackendError> {
        let client = self
            .clusters
            .client(self.cluster_id)
            .await
            .map_err(from_common)?;
        let controller_installed = crd_exists(&client, APPLICATION_CRD)
            .await
            .map_err(from_common)?;

        let state = GitOpsState {
            configured: self.repository_configured,
            controller_installed,
        };
        debug!(
            configured = state.configured,
            controller_installed, "Read GitOps state"
        );
        Ok(state)
    }
}
