//! Per-cluster Kubernetes client registry
//!
//! Environments point at clusters by numeric id. The registry maps those
//! ids to kubeconfig endpoints and hands out cached clients so a batch
//! touching fifty workloads on one cluster builds a single client.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use kube::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::kube_utils::{create_client, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
use crate::Error;

/// How to reach one cluster's API server
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterEndpoint {
    /// Kubeconfig file; `None` infers the ambient config
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
    /// Kubeconfig context to select
    #[serde(default)]
    pub context: Option<String>,
}

/// Cluster id to endpoint mapping with a client cache
pub struct ClusterRegistry {
    endpoints: HashMap<i64, ClusterEndpoint>,
    clients: RwLock<HashMap<i64, Client>>,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl ClusterRegistry {
    /// Create a registry over the given endpoints
    pub fn new(endpoints: HashMap<i64, ClusterEndpoint>) -> Self {
        Self {
            endpoints,
            clients: RwLock::new(HashMap::new()),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Override client timeouts
    pub fn with_timeouts(mut self, connect_timeout: Duration, read_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self.read_timeout = read_timeout;
        self
    }

    /// Endpoint registered for a cluster
    pub fn endpoint(&self, cluster_id: i64) -> Result<&ClusterEndpoint, Error> {
        self.endpoints
            .get(&cluster_id)
            .ok_or(Error::ClusterNotRegistered { cluster_id })
    }

    /// Ids of all registered clusters
    pub fn cluster_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.endpoints.keys().copied()
    }

    /// Get (or build and cache) the client for a cluster
    pub async fn client(&self, cluster_id: i64) -> Result<Client, Error> {
        if let Some(client) = self.clients.read().await.get(&cluster_id) {
            return Ok(client.clone());
        }

        let endpoint = self.endpoint(cluster_id)?;
        let client = create_client(
            endpoint.kubeconfig.as_deref(),
            endpoint.context.as_deref(),
            self.connect_timeout,
            self.read_timeout,
        )
        .await?;

        debug!(cluster_id, "Created cluster client");

        let mut clients = self.clients.write().await;
        Ok(clients.entry(cluster_id).or_insert(client).clone())
    }
}
