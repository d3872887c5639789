//! keel configuration file
//!
//! A YAML file names every cluster keel may touch, where Argo CD runs and
//! how helm is invoked:
//!
//! ```yaml
//! clusters:
//!   1:
//!     kubeconfig: /etc/keel/prod.kubeconfig
//!     context: prod
//! gitops:
//!   clusterId: 1
//!   namespace: argocd
//! helm:
//!   path: /usr/local/bin/helm
//!   timeoutSeconds: 120
//! reachability:
//!   timeoutSeconds: 5
//!   retry:
//!     maxAttempts: 3
//! concurrency: 4
//! cascadeDelete: true
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use keel_backend::argocd::DEFAULT_ARGOCD_NAMESPACE;
use keel_backend::helm::DEFAULT_HELM_TIMEOUT;
use keel_backend::ReachabilityConfig;
use keel_common::{ClusterEndpoint, ClusterRegistry};
use keel_migrate::orchestrator::DEFAULT_CONCURRENCY;
use keel_migrate::MigrationConfig;

use crate::{Error, Result};

/// Where the Argo CD control plane runs
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitOpsSettings {
    /// Cluster hosting Argo CD
    pub cluster_id: i64,
    /// Namespace Argo CD watches for applications
    #[serde(default = "default_argocd_namespace")]
    pub namespace: String,
}

fn default_argocd_namespace() -> String {
    DEFAULT_ARGOCD_NAMESPACE.to_string()
}

/// How helm is run
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HelmSettings {
    /// helm binary
    pub path: PathBuf,
    /// Per-invocation timeout
    pub timeout_seconds: u64,
}

impl Default for HelmSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("helm"),
            timeout_seconds: DEFAULT_HELM_TIMEOUT.as_secs(),
        }
    }
}

impl HelmSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Parsed configuration file
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeelConfig {
    /// Cluster id to kubeconfig endpoint
    pub clusters: HashMap<i64, ClusterEndpoint>,
    /// Argo CD location
    pub gitops: GitOpsSettings,
    #[serde(default)]
    pub helm: HelmSettings,
    #[serde(default)]
    pub reachability: ReachabilityConfig,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_cascade_delete")]
    pub cascade_delete: bool,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_cascade_delete() -> bool {
    true
}

impl KeelConfig {
    /// Read and validate the file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&data).map_err(|source| Error::ParseConfig {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    fn parse(data: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(data)
    }

    fn validate(&self) -> Result<()> {
        if !self.clusters.contains_key(&self.gitops.cluster_id) {
            return Err(Error::validation(format!(
                "gitops.clusterId {} is not listed under clusters",
                self.gitops.cluster_id
            )));
        }
        if self.concurrency == 0 {
            return Err(Error::validation("concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Client registry over the configured clusters
    pub fn registry(&self) -> ClusterRegistry {
        ClusterRegistry::new(self.clusters.clone())
    }

    /// Engine tunables, with `concurrency` overriding the file when set
    pub fn migration(&self, concurrency: Option<usize>) -> MigrationConfig {
        MigrationConfig {
            concurrency: concurrency.unwrap_or(self.concurrency).max(1),
            cascade_delete: self.cascade_delete,
        }
    }
}
