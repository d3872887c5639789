//! Cluster liveness probe
//!
//! A cluster counts as reachable once its API server answers at all. An
//! API error response still proves the server is up.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use keel_common::retry::{retry_with_backoff, RetryConfig};
use keel_common::ClusterRegistry;
use keel_migrate::ports::ClusterReachability;
use keel_migrate::BackendError;

use crate::error::from_common;

/// Probe settings
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReachabilityConfig {
    /// Time allowed for one probe attempt, in seconds
    pub timeout_seconds: u64,
    /// Retries for transient failures
    pub retry: RetryConfig,
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl ReachabilityConfig {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// [`ClusterReachability`] asking each API server for its version
pub struct ApiServerProbe {
    clusters: Arc<ClusterRegistry>,
    config: ReachabilityConfig,
}

impl ApiServerProbe {
    /// Create a probe resolving clusters through `clusters`
    pub fn new(clusters: Arc<ClusterRegistry>, config: ReachabilityConfig) -> Self {
        Self { clusters, config }
    }
}

/// Probe one client, retrying until it answers or retries run out
pub async fn probe(client: &Client, config: &ReachabilityConfig) -> bool {
    let timeout = config.timeout();
    let result = retry_with_backoff(
        &config.retry,
        "apiserver_version",
        || {
            let client = client.clone();
            async move {
                match tokio::time::timeout(timeout, client.apiserver_version()).await {
                    Ok(Ok(_)) | Ok(Err(kube::Error::Api(_))) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!("no answer within {:?}", timeout)),
                }
            }
        },
        |_| true,
    )
    .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "API server did not answer");
            false
        }
    }
}

#[async_trait]
impl ClusterReachability for ApiServerProbe {
    async fn is_reachable(&self, cluster_id: i64) -> Result<bool, BackendError> {
        let client = self
            .clusters
            .client(cluster_id)
            .await
            .map_err(from_common)?;
        let reachable = probe(&client, &self.config).await;
        debug!(cluster_id, reachable, "Probed cluster");
        Ok(reachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults_and_overrides() {
        let config: ReachabilityConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, ReachabilityConfig::default());

        let config: ReachabilityConfig =
            serde_yaml::from_str("timeoutSeconds: 2\nretry:\n  maxAttempts: 5\n  initialDelay: 50\n")
                .unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(2));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn unregistered_cluster_is_an_error() {
        let probe = ApiServerProbe::new(
            Arc::new(ClusterRegistry::new(HashMap::new())),
            ReachabilityConfig::default(),
        );
        assert!(probe.is_reachable(3).await.is_err());
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let config = kube::Config::new("http://127.0.0.1:1".parse().unwrap());
        let client = Client::try_from(config).unwrap();
        let settings = ReachabilityConfig {
            timeout_seconds: 2,
            retry: RetryConfig::once(),
        };
        assert!(!probe(&client, &settings).await);
    }
}
