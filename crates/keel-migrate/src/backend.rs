//! Uniform operations over either deployment backend
//!
//! The engine never branches on the backend kind to decide which API to
//! call. It asks [`Backends`] for the adapter of a workload's backend and
//! talks to it through [`BackendAdapter`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::BackendError;
use crate::model::{BackendStatus, DeploymentBackend, Workload};
use crate::ports::{GitOpsControllerAdapter, ReleaseManagerAdapter};

/// Backend-agnostic workload operations
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend this adapter talks to
    fn kind(&self) -> DeploymentBackend;

    /// Delete the workload. An already-absent workload is a success.
    async fn delete(&self, workload: &Workload) -> Result<(), BackendError>;

    /// Current state of the workload on this backend
    async fn status(&self, workload: &Workload) -> Result<BackendStatus, BackendError>;

    /// Whether the backend still holds the workload
    async fn exists(&self, workload: &Workload) -> Result<bool, BackendError>;
}

// =============================================================================
// Release manager
// =============================================================================

/// [`BackendAdapter`] over a [`ReleaseManagerAdapter`]
pub struct ReleaseManagerBackend {
    adapter: Arc<dyn ReleaseManagerAdapter>,
}

impl ReleaseManagerBackend {
    /// Wrap a release manager adapter
    pub fn new(adapter: Arc<dyn ReleaseManagerAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl BackendAdapter for ReleaseManagerBackend {
    fn kind(&self) -> DeploymentBackend {
        DeploymentBackend::ReleaseManager
    }

    async fn delete(&self, workload: &Workload) -> Result<(), BackendError> {
        let release = workload.release_identifier();
        match self.adapter.delete(&release).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(BackendError::other(format!(
                "release manager refused to uninstall {}",
                release.release_name
            ))),
            Err(BackendError::NotFound(_)) => {
                debug!(release = %release.release_name, "Release already uninstalled");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn status(&self, workload: &Workload) -> Result<BackendStatus, BackendError> {
        let release = self
            .adapter
            .get_latest_release(&workload.release_identifier())
            .await?;
        Ok(BackendStatus {
            name: release.name,
            state: release.status,
        })
    }

    async fn exists(&self, workload: &Workload) -> Result<bool, BackendError> {
        self.adapter.exists(&workload.release_identifier()).await
    }
}

// =============================================================================
// GitOps controller
// =============================================================================

/// [`BackendAdapter`] over a [`GitOpsControllerAdapter`]
pub struct GitOpsControllerBackend {
    adapter: Arc<dyn GitOpsControllerAdapter>,
    cascade: bool,
}

impl GitOpsControllerBackend {
    /// Wrap a GitOps controller adapter
    pub fn new(adapter: Arc<dyn GitOpsControllerAdapter>, cascade: bool) -> Self {
        Self { adapter, cascade }
    }
}

#[async_trait]
impl BackendAdapter for GitOpsControllerBackend {
    fn kind(&self) -> DeploymentBackend {
        DeploymentBackend::GitOpsController
    }

    async fn delete(&self, workload: &Workload) -> Result<(), BackendError> {
        let name = workload.release_name();
        match self.adapter.delete(&name, self.cascade).await {
            Ok(()) => Ok(()),
            Err(BackendError::NotFound(_)) => {
                debug!(application = %name, "Application already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn status(&self, workload: &Workload) -> Result<BackendStatus, BackendError> {
        let app = self.adapter.get_by_name(&workload.release_name()).await?;
        Ok(BackendStatus {
            name: app.name,
            state: format!("{}/{}", app.health, app.sync),
        })
    }

    async fn exists(&self, workload: &Workload) -> Result<bool, BackendError> {
        match self.adapter.get_by_name(&workload.release_name()).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One adapter per backend variant
#[derive(Clone)]
pub struct Backends {
    release_manager: Arc<dyn BackendAdapter>,
    gitops_controller: Arc<dyn BackendAdapter>,
}

impl Backends {
    /// Create a registry from the two adapters
    pub fn new(
        release_manager: Arc<dyn BackendAdapter>,
        gitops_controller: Arc<dyn BackendAdapter>,
    ) -> Self {
        Self {
            release_manager,
            gitops_controller,
        }
    }

    /// Adapter for a backend
    pub fn get(&self, backend: DeploymentBackend) -> &dyn BackendAdapter {
        match backend {
            DeploymentBackend::ReleaseManager => self.release_manager.as_ref(),
            DeploymentBackend::GitOpsController => self.gitops_controller.as_ref(),
        }
    }
}
