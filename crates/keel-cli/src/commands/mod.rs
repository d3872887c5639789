//! CLI commands

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use keel_backend::{
    ApiServerProbe, ArgoCdConfigReader, ArgoCdController, HelmCli, HelmReleaseManager,
    KubePatcher,
};
use keel_migrate::{DeploymentBackend, MigrationContext, MigrationRequest, MigrationResponse, Migrator};
use keel_store::PgStore;

use crate::config::KeelConfig;
use crate::{Error, Result};

pub mod db;
pub mod migrate;
pub mod trigger;

/// Selection shared by both migration phases
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Environment to migrate
    #[arg(long)]
    pub environment: i64,

    /// Backend to move to (`helm` or `argo_cd`)
    #[arg(long)]
    pub to: DeploymentBackend,

    /// Only these workload ids (repeatable)
    #[arg(long = "include", value_delimiter = ',')]
    pub include: Vec<i64>,

    /// Skip these workload ids (repeatable)
    #[arg(long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<i64>,

    /// User recorded as the actor on configs and deployments
    #[arg(long, env = "KEEL_ACTOR_ID")]
    pub actor: i32,

    /// Workloads processed concurrently
    #[arg(long, env = "KEEL_CONCURRENCY")]
    pub concurrency: Option<usize>,
}

impl SelectionArgs {
    pub fn request(&self) -> MigrationRequest {
        MigrationRequest::new(self.environment, self.to, self.actor)
            .including(self.include.iter().copied())
            .excluding(self.exclude.iter().copied())
    }
}

/// Wire the engine to Postgres, helm and the configured clusters
pub async fn build_migrator(
    config_path: &Path,
    database_url: &str,
    concurrency: Option<usize>,
) -> Result<Migrator> {
    let config = KeelConfig::load(config_path)?;
    let store = Arc::new(PgStore::connect(database_url, keel_store::DEFAULT_MAX_CONNECTIONS).await?);
    let clusters = Arc::new(config.registry());

    let repository_configured = store.gitops_repository_configured().await?;
    if !repository_configured {
        info!("No GitOps repository configured");
    }

    let helm = Arc::new(HelmCli::new(&config.helm.path, config.helm.timeout()));
    let ctx = MigrationContext {
        workloads: store.clone(),
        environments: store.clone(),
        configs: store.clone(),
        health: store.clone(),
        history: store.clone(),
        redeploy: store,
        release_manager: Arc::new(HelmReleaseManager::new(helm, clusters.clone())),
        gitops: Arc::new(ArgoCdController::new(
            clusters.clone(),
            config.gitops.cluster_id,
            config.gitops.namespace.clone(),
        )),
        gitops_config: Arc::new(ArgoCdConfigReader::new(
            clusters.clone(),
            config.gitops.cluster_id,
            repository_configured,
        )),
        patcher: Arc::new(KubePatcher::new(clusters.clone())),
        reachability: Arc::new(ApiServerProbe::new(clusters, config.reachability.clone())),
    };

    Ok(Migrator::new(ctx, config.migration(concurrency)))
}

/// Token cancelled on Ctrl-C
///
/// Workloads already dispatched finish; the rest are reported as cancelled.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight workloads");
            cancel.cancel();
        }
    });
    token
}

/// Print the response as JSON and fail when any workload failed
pub fn report(response: &MigrationResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    if response.is_complete() {
        Ok(())
    } else {
        Err(Error::Incomplete {
            failed: response.failed_workloads.len(),
        })
    }
}
