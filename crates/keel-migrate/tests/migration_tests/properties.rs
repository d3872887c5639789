//! Guarantees every batch upholds

use std::collections::HashSet;

use keel_migrate::model::HealthStatus;
use keel_migrate::{DeploymentBackend, MigrationError, MigrationRequest, MigrationResponse, MigrationStatus};
use tokio_util::sync::CancellationToken;

use super::fakes::{FakePlatform, ENV_ID};

fn ids(changes: &[keel_migrate::ChangeStatus]) -> HashSet<i64> {
    changes.iter().map(|c| c.workload_id).collect()
}

fn assert_partitions(response: &MigrationResponse, selected: &[i64]) {
    let ok = ids(&response.successful_workloads);
    let failed = ids(&response.failed_workloads);
    assert!(ok.is_disjoint(&failed), "workload reported in both lists");
    assert_eq!(response.len(), selected.len());
    let all: HashSet<i64> = ok.union(&failed).copied().collect();
    assert_eq!(all, selected.iter().copied().collect::<HashSet<_>>());
}

/// A batch with every kind of per-workload failure still accounts for each
/// workload exactly once.
#[tokio::test]
async fn every_selected_workload_lands_in_exactly_one_list() {
    let platform = FakePlatform::new();
    for id in 1..=5 {
        platform.install(id, DeploymentBackend::ReleaseManager);
    }
    {
        let mut state = platform.state();
        state.workloads.get_mut(&2).unwrap().environment_name.clear();
        state.failing_deletes.insert("svc3-prod".to_string());
        state.releases.remove("svc4-prod");
    }

    let request = MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1);
    let response = platform
        .migrator()
        .migrate_deployment_type(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_partitions(&response, &[1, 2, 3, 4, 5]);
    assert_eq!(ids(&response.failed_workloads), HashSet::from([2, 3]));

    let phase2 = platform
        .migrator()
        .trigger_after_migration(&request, &CancellationToken::new())
        .await
        .unwrap();
    assert_partitions(&phase2, &[1, 4, 5]);
}

/// Deleting something the backend already forgot is the desired end state.
#[tokio::test]
async fn deleting_an_absent_release_is_initiated() {
    let platform = FakePlatform::new();
    platform.install(1, DeploymentBackend::ReleaseManager);
    platform.state().releases.clear();

    let response = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.failed_workloads.is_empty());
    assert_eq!(response.successful_workloads[0].status, MigrationStatus::Initiated);
}

/// Phase 2 works off persisted state, so calling it again gives the same
/// answer.
#[tokio::test]
async fn completion_phase_is_repeatable() {
    let platform = FakePlatform::new();
    platform.flipped(1, DeploymentBackend::GitOpsController, false);
    platform.flipped(2, DeploymentBackend::GitOpsController, false);
    platform.flipped(3, DeploymentBackend::GitOpsController, true);

    let request = MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1);
    let migrator = platform.migrator();
    let first = migrator
        .trigger_after_migration(&request, &CancellationToken::new())
        .await
        .unwrap();
    // A fresh engine stands in for a process restart
    let second = platform
        .migrator()
        .trigger_after_migration(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(ids(&first.successful_workloads), HashSet::from([1, 2]));
    assert_eq!(
        ids(&first.successful_workloads),
        ids(&second.successful_workloads)
    );
    assert_eq!(first.pending(), vec![3]);
    assert_eq!(second.pending(), vec![3]);
}

/// A GitOps workload whose health cannot be read is never deleted.
#[tokio::test]
async fn unknown_health_blocks_deletion() {
    let platform = FakePlatform::new();
    let blocked = platform.install(1, DeploymentBackend::GitOpsController);
    let healthy = platform.install(2, DeploymentBackend::GitOpsController);
    {
        let mut state = platform.state();
        state.failing_health_apps.insert(blocked.app_id);
        state.health.insert(
            (healthy.app_id, ENV_ID),
            HealthStatus {
                app_id: healthy.app_id,
                environment_id: ENV_ID,
                status: "Healthy".to_string(),
            },
        );
    }

    let response = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::ReleaseManager, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let state = platform.state();
    let deleted: Vec<&str> = state.deletes.iter().map(|(_, name)| name.as_str()).collect();
    assert_eq!(deleted, vec!["svc2-prod"]);
    assert!(state.applications.contains("svc1-prod"));
    assert_eq!(response.failed_workloads.len(), 1);
    assert!(response.failed_workloads[0].error.contains("health lookup timed out"));
}

/// An unreachable cluster aborts the batch before any delete.
#[tokio::test]
async fn unreachable_cluster_deletes_nothing() {
    let platform = FakePlatform::new();
    platform.install(1, DeploymentBackend::ReleaseManager);
    platform.install(2, DeploymentBackend::ReleaseManager);
    platform.state().reachable = false;

    let err = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, MigrationError::ClusterUnreachable { .. }));
    assert!(err.is_retryable());
    let state = platform.state();
    assert!(state.deletes.is_empty());
    assert!(state.upserts.is_empty());
}
