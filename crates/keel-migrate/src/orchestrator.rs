//! Two-phase backend migration
//!
//! Phase 1 ([`Migrator::migrate_deployment_type`]) deletes workloads from
//! their old backend and flips their persisted config. Phase 2
//! ([`Migrator::trigger_after_migration`]) confirms the old backend let go
//! and redeploys on the new one. Phase 2 derives its candidates from the
//! persisted config alone, so it can be polled repeatedly and survives
//! process restarts between the phases.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::accumulator::{Outcome, PartialFailureAccumulator};
use crate::backend::{Backends, GitOpsControllerBackend, ReleaseManagerBackend};
use crate::dispatch::DeletionDispatcher;
use crate::error::MigrationError;
use crate::gate::ensure_cluster_reachable;
use crate::model::{
    DeploymentBackend, Environment, MigrationRequest, MigrationResponse, MigrationStatus, Workload,
};
use crate::ports::{
    ClusterReachability, DeploymentConfigStore, DeploymentHistoryStore, EnvironmentStore,
    GitOpsConfigReader, GitOpsControllerAdapter, HealthStatusStore, K8sPatcher, RedeployTrigger,
    ReleaseManagerAdapter, WorkloadStore,
};
use crate::prepare::PreMigrationPreparer;
use crate::reconcile::ConfigReconciler;
use crate::redeploy::Redeployer;
use crate::verify::CompletionVerifier;

/// Reason recorded for workloads skipped after cancellation
pub const CANCELLED_BEFORE_DISPATCH: &str = "migration cancelled before dispatch";

/// Default size of the per-batch worker pool
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Engine tunables
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Workloads processed concurrently within one batch
    pub concurrency: usize,
    /// Delete GitOps applications together with their resources
    pub cascade_delete: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cascade_delete: true,
        }
    }
}

/// Every collaborator the engine talks to
#[derive(Clone)]
pub struct MigrationContext {
    /// Workload selection
    pub workloads: Arc<dyn WorkloadStore>,
    /// Environment lookup
    pub environments: Arc<dyn EnvironmentStore>,
    /// Deployment config persistence
    pub configs: Arc<dyn DeploymentConfigStore>,
    /// GitOps health rows
    pub health: Arc<dyn HealthStatusStore>,
    /// Versions and "last deployed" bookkeeping
    pub history: Arc<dyn DeploymentHistoryStore>,
    /// Deployment event submission
    pub redeploy: Arc<dyn RedeployTrigger>,
    /// Helm
    pub release_manager: Arc<dyn ReleaseManagerAdapter>,
    /// Argo CD
    pub gitops: Arc<dyn GitOpsControllerAdapter>,
    /// GitOps configuration state
    pub gitops_config: Arc<dyn GitOpsConfigReader>,
    /// CRD patching before moving to Helm
    pub patcher: Arc<dyn K8sPatcher>,
    /// Cluster liveness
    pub reachability: Arc<dyn ClusterReachability>,
}

/// Runs both migration phases
pub struct Migrator {
    ctx: MigrationContext,
    backends: Backends,
    config: MigrationConfig,
}

impl Migrator {
    /// Create a migrator over `ctx`
    pub fn new(ctx: MigrationContext, config: MigrationConfig) -> Self {
        let backends = Backends::new(
            Arc::new(ReleaseManagerBackend::new(ctx.release_manager.clone())),
            Arc::new(GitOpsControllerBackend::new(
                ctx.gitops.clone(),
                config.cascade_delete,
            )),
        );
        Self {
            ctx,
            backends,
            config,
        }
    }

    /// Engine tunables in effect
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Phase 1: delete the selected workloads from their old backend and
    /// point their config at the desired one.
    ///
    /// Only batch-abort conditions are returned as errors. Per-workload
    /// failures are reported in the response.
    #[instrument(
        skip_all,
        fields(
            environment_id = request.environment_id,
            desired = %request.desired_backend,
        )
    )]
    pub async fn migrate_deployment_type(
        &self,
        request: &MigrationRequest,
        cancel: &CancellationToken,
    ) -> Result<MigrationResponse, MigrationError> {
        let desired = request.desired_backend;
        let source = request.source_backend();

        let environment = self.environment(request.environment_id).await?;
        ensure_cluster_reachable(self.ctx.reachability.as_ref(), &environment).await?;

        let candidates = self.select(request, source).await?;
        if candidates.is_empty() {
            return Err(MigrationError::NoCandidates {
                environment_id: request.environment_id,
                backend: source,
            });
        }
        info!(count = candidates.len(), from = %source, "Migrating workloads");

        if desired == DeploymentBackend::ReleaseManager {
            PreMigrationPreparer::new(self.ctx.gitops.as_ref(), self.ctx.patcher.as_ref())
                .prepare_all(&candidates)
                .await?;
        }

        let gitops_state = self.ctx.gitops_config.is_configured().await?;
        let dispatcher =
            DeletionDispatcher::new(&self.backends, self.ctx.health.as_ref(), gitops_state, desired);

        let mut acc = PartialFailureAccumulator::new(request.environment_id, desired);
        for (workload, outcome) in self
            .bounded(&candidates, Some(cancel), |w| dispatcher.dispatch(w))
            .await
        {
            acc.record(workload, outcome.unwrap_or_else(cancelled));
        }

        // Deletion already happened for these, so reconciliation ignores cancellation
        let deleted = by_id(&candidates, &acc.successful_ids());
        let reconciler = ConfigReconciler::new(self.ctx.configs.as_ref(), self.ctx.health.as_ref());
        let mut failures: Vec<_> = self
            .bounded(deleted, None, |w| {
                reconciler.reconcile(w, desired, request.actor_id)
            })
            .await
            .into_iter()
            .filter_map(|(_, result)| result.and_then(|r| r.err()))
            .collect();

        let response = acc.finish();
        if !failures.is_empty() {
            failures.sort_by_key(|f| f.workload_id);
            return Err(MigrationError::ConfigReconcile {
                failures,
                response: Box::new(response),
            });
        }

        info!(
            succeeded = response.successful_workloads.len(),
            failed = response.failed_workloads.len(),
            "Deletion phase finished"
        );
        Ok(response)
    }

    /// Phase 2: confirm the old backend no longer has each workload, then
    /// redeploy it on the new backend.
    ///
    /// Candidates are workloads already flipped to the desired backend. An
    /// empty selection is a normal terminal state, not an error.
    #[instrument(
        skip_all,
        fields(
            environment_id = request.environment_id,
            desired = %request.desired_backend,
        )
    )]
    pub async fn trigger_after_migration(
        &self,
        request: &MigrationRequest,
        cancel: &CancellationToken,
    ) -> Result<MigrationResponse, MigrationError> {
        let desired = request.desired_backend;
        let candidates = self.select(request, desired).await?;
        let mut acc = PartialFailureAccumulator::new(request.environment_id, desired);
        if candidates.is_empty() {
            info!("Nothing left to verify");
            return Ok(acc.finish());
        }

        let verifier = CompletionVerifier::new(self.backends.get(desired.other()));
        for (workload, outcome) in self
            .bounded(&candidates, Some(cancel), |w| verifier.verify(w))
            .await
        {
            acc.record(workload, outcome.unwrap_or_else(cancelled));
        }

        let confirmed = acc.successful_ids();
        if confirmed.is_empty() {
            return Ok(acc.finish());
        }

        // Another caller may have moved a workload since selection
        let fresh: HashMap<i64, Workload> = self
            .ctx
            .workloads
            .find_by_ids(&confirmed)
            .await?
            .into_iter()
            .map(|w| (w.id, w.normalize()))
            .collect();
        let mut ready = Vec::with_capacity(confirmed.len());
        for id in confirmed {
            match fresh.get(&id) {
                Some(w) if w.current_backend == desired => ready.push(w),
                Some(w) => acc.demote(
                    id,
                    MigrationStatus::Failed,
                    format!("workload moved to {} during migration", w.current_backend),
                ),
                None => acc.demote(id, MigrationStatus::Failed, "workload no longer exists"),
            }
        }

        let redeployer = &Redeployer::new(self.ctx.history.as_ref(), self.ctx.redeploy.as_ref());
        let reconciler = &ConfigReconciler::new(self.ctx.configs.as_ref(), self.ctx.health.as_ref());
        let actor_id = request.actor_id;
        let results = self
            .bounded(ready, Some(cancel), |w| async move {
                let result = redeployer.redeploy(w, desired, actor_id).await;
                if result.is_ok() {
                    reconciler.cleanup(w, desired).await;
                }
                result
            })
            .await;
        for (workload, result) in results {
            match result {
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(workload_id = workload.id, error = %e, "Redeploy failed");
                    acc.demote(
                        workload.id,
                        MigrationStatus::Failed,
                        format!("failed to redeploy on {}: {}", desired, e),
                    );
                }
                None => acc.demote(workload.id, MigrationStatus::Failed, CANCELLED_BEFORE_DISPATCH),
            }
        }

        let response = acc.finish();
        info!(
            succeeded = response.successful_workloads.len(),
            pending = response.pending().len(),
            failed = response.failed_workloads.len(),
            "Completion phase finished"
        );
        Ok(response)
    }

    async fn environment(&self, environment_id: i64) -> Result<Environment, MigrationError> {
        self.ctx
            .environments
            .find_environment(environment_id)
            .await?
            .ok_or(MigrationError::EnvironmentNotFound { environment_id })
    }

    async fn select(
        &self,
        request: &MigrationRequest,
        backend: DeploymentBackend,
    ) -> Result<Vec<Workload>, MigrationError> {
        let workloads = self
            .ctx
            .workloads
            .select_by_environment_and_backend(
                request.environment_id,
                backend,
                &request.include_workload_ids,
                &request.exclude_workload_ids,
            )
            .await?;
        Ok(workloads.into_iter().map(Workload::normalize).collect())
    }

    /// Run `step` for every workload with at most `concurrency` in flight.
    ///
    /// Once `cancel` fires no further step starts; those workloads come back
    /// with `None`. Steps already running finish.
    async fn bounded<'w, I, F, Fut, T>(
        &self,
        workloads: I,
        cancel: Option<&CancellationToken>,
        step: F,
    ) -> Vec<(&'w Workload, Option<T>)>
    where
        I: IntoIterator<Item = &'w Workload>,
        F: Fn(&'w Workload) -> Fut,
        Fut: Future<Output = T>,
    {
        stream::iter(workloads)
            .map(|w| {
                let started = cancel
                    .map_or(true, |c| !c.is_cancelled())
                    .then(|| step(w));
                async move {
                    match started {
                        Some(fut) => (w, Some(fut.await)),
                        None => (w, None),
                    }
                }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }
}

fn cancelled() -> Outcome {
    Outcome::failed(CANCELLED_BEFORE_DISPATCH)
}

fn by_id<'w>(workloads: &'w [Workload], ids: &[i64]) -> Vec<&'w Workload> {
    workloads.iter().filter(|w| ids.contains(&w.id)).collect()
}
