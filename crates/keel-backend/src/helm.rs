//! Release manager adapter over the Helm CLI
//!
//! Every call targets the workload's cluster by passing the registered
//! kubeconfig and context to `helm`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use keel_common::ClusterRegistry;
use keel_migrate::model::{ReleaseIdentifier, ReleaseInfo};
use keel_migrate::ports::ReleaseManagerAdapter;
use keel_migrate::BackendError;

use crate::error::{from_common, from_helm_stderr};

/// Default time allowed for a single helm invocation
pub const DEFAULT_HELM_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured result of a helm invocation
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HelmOutput {
    /// Exit status was zero
    pub success: bool,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Runs helm with the given arguments
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelmRunner: Send + Sync {
    /// Run `helm <args>` to completion
    async fn run(&self, args: Vec<String>) -> Result<HelmOutput, BackendError>;
}

/// [`HelmRunner`] spawning the helm binary
pub struct HelmCli {
    binary: PathBuf,
    timeout: Duration,
}

impl HelmCli {
    /// Run `binary` with a per-call timeout
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl Default for HelmCli {
    fn default() -> Self {
        Self::new("helm", DEFAULT_HELM_TIMEOUT)
    }
}

#[async_trait]
impl HelmRunner for HelmCli {
    async fn run(&self, args: Vec<String>) -> Result<HelmOutput, BackendError> {
        debug!(binary = %self.binary.display(), ?args, "Running helm");
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary).args(&args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| {
            BackendError::other(format!("helm {} timed out after {:?}", args.join(" "), self.timeout))
        })?
        .map_err(|e| {
            BackendError::other(format!("failed to run {}: {}", self.binary.display(), e))
        })?;

        Ok(HelmOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// One entry of `helm history -o json`
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    revision: i64,
    status: String,
}

/// [`ReleaseManagerAdapter`] backed by helm
pub struct HelmReleaseManager {
    runner: Arc<dyn HelmRunner>,
    clusters: Arc<ClusterRegistry>,
}

impl HelmReleaseManager {
    /// Create an adapter resolving clusters through `clusters`
    pub fn new(runner: Arc<dyn HelmRunner>, clusters: Arc<ClusterRegistry>) -> Self {
        Self { runner, clusters }
    }

    /// Arguments for `command` against `release`, including cluster flags
    fn args(
        &self,
        command: &[&str],
        release: &ReleaseIdentifier,
    ) -> Result<Vec<String>, BackendError> {
        let endpoint = self
            .clusters
            .endpoint(release.cluster_id)
            .map_err(from_common)?;

        let mut args: Vec<String> = command.iter().map(|s| s.to_string()).collect();
        args.push(release.release_name.clone());
        args.push("--namespace".to_string());
        args.push(release.namespace.clone());
        if let Some(path) = &endpoint.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(path.display().to_string());
        }
        if let Some(context) = &endpoint.context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        Ok(args)
    }

    async fn run(
        &self,
        command: &[&str],
        release: &ReleaseIdentifier,
    ) -> Result<String, BackendError> {
        let output = self.runner.run(self.args(command, release)?).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(from_helm_stderr(&output.stderr))
        }
    }
}

#[async_trait]
impl ReleaseManagerAdapter for HelmReleaseManager {
    async fn delete(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError> {
        self.run(&["uninstall"], release).await?;
        info!(
            release = %release.release_name,
            namespace = %release.namespace,
            cluster_id = release.cluster_id,
            "Helm release uninstalled"
        );
        Ok(true)
    }

    async fn exists(&self, release: &ReleaseIdentifier) -> Result<bool, BackendError> {
        match self.run(&["status", "-o", "json"], release).await {
            Ok(_) => Ok(true),
            Err(BackendError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn get_latest_release(
        &self,
        release: &ReleaseIdentifier,
    ) -> Result<ReleaseInfo, BackendError> {
        let stdout = self
            .run(&["history", "--max", "1", "-o", "json"], release)
            .await?;
        parse_latest(&stdout, release)
    }
}

fn parse_latest(stdout: &str, release: &ReleaseIdentifier) -> Result<ReleaseInfo, BackendError> {
    let entries: Vec<HistoryEntry> = serde_json::from_str(stdout)
        .map_err(|e| BackendError::other(format!("unexpected helm history output: {}", e)))?;
    let latest = entries
        .into_iter()
        .max_by_key(|e| e.revision)
        .ok_or_else(|| BackendError::NotFound(format!("release {} has no revisions", release.release_name)))?;

    Ok(ReleaseInfo {
        name: release.release_name.clone(),
        namespace: release.namespace.clone(),
        revision: latest.revision,
        status: latest.status,
    })
}
