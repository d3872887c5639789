//! Migrations an operator runs end to end

use keel_migrate::model::{OfferingMode, ResourceNode};
use keel_migrate::{DeploymentBackend, MigrationRequest, MigrationStatus};
use tokio_util::sync::CancellationToken;

use super::fakes::{FakePlatform, ENV_ID};

/// Three Helm releases move to Argo CD and their configs follow.
#[tokio::test]
async fn helm_to_gitops_deletes_and_flips_every_config() {
    let platform = FakePlatform::new();
    for id in 1..=3 {
        platform.install(id, DeploymentBackend::ReleaseManager);
    }

    let response = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.failed_workloads.is_empty());
    assert_eq!(response.successful_workloads.len(), 3);
    assert!(response
        .successful_workloads
        .iter()
        .all(|c| c.status == MigrationStatus::Initiated));

    let state = platform.state();
    assert_eq!(state.upserts.len(), 3);
    assert!(state.upserts.iter().all(|(cfg, offering)| {
        cfg.deployment_backend == DeploymentBackend::GitOpsController
            && *offering == Some(OfferingMode::Full)
    }));
    assert!(state.releases.is_empty());
    assert!(state
        .workloads
        .values()
        .all(|w| w.current_backend == DeploymentBackend::GitOpsController));
}

/// Leaving Argo CD for Helm does not need a GitOps repository.
#[tokio::test]
async fn gitops_to_helm_ignores_missing_repository() {
    let platform = FakePlatform::new();
    platform.install(1, DeploymentBackend::GitOpsController);
    platform.install(2, DeploymentBackend::GitOpsController);
    platform.state().gitops.configured = false;

    let response = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::ReleaseManager, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.failed_workloads.is_empty());
    assert_eq!(response.successful_workloads.len(), 2);
    let state = platform.state();
    assert!(state.applications.is_empty());
    assert!(state.upserts.iter().all(|(_, offering)| offering.is_none()));
}

/// Moving to Argo CD without a repository fails every workload and
/// touches nothing.
#[tokio::test]
async fn helm_to_unconfigured_gitops_fails_every_workload() {
    let platform = FakePlatform::new();
    platform.install(1, DeploymentBackend::ReleaseManager);
    platform.install(2, DeploymentBackend::ReleaseManager);
    platform.state().gitops.configured = false;

    let response = platform
        .migrator()
        .migrate_deployment_type(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.successful_workloads.is_empty());
    assert_eq!(response.failed_workloads.len(), 2);
    assert!(response
        .failed_workloads
        .iter()
        .all(|c| c.error.contains("GitOps not configured")));
    let state = platform.state();
    assert!(state.deletes.is_empty());
    assert!(state.upserts.is_empty());
}

/// A confirmed deletion is redeployed exactly once.
#[tokio::test]
async fn confirmed_deletion_redeploys_once() {
    let platform = FakePlatform::new();
    let w = platform.flipped(1, DeploymentBackend::GitOpsController, false);

    let response = platform
        .migrator()
        .trigger_after_migration(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(response.successful_workloads.len(), 1);
    assert_eq!(response.successful_workloads[0].workload_id, w.id);
    assert_eq!(response.successful_workloads[0].status, MigrationStatus::Success);
    let state = platform.state();
    assert_eq!(
        state.events,
        vec![(1000 + w.id, DeploymentBackend::GitOpsController)]
    );
    assert_eq!(state.marked.len(), 1);
}

/// A release Helm still holds is reported for a later retry and not
/// redeployed.
#[tokio::test]
async fn lingering_release_is_not_yet_deleted() {
    let platform = FakePlatform::new();
    platform.flipped(1, DeploymentBackend::GitOpsController, true);

    let response = platform
        .migrator()
        .trigger_after_migration(
            &MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert!(response.successful_workloads.is_empty());
    assert_eq!(response.failed_workloads[0].status, MigrationStatus::NotYetDeleted);
    assert_eq!(response.pending(), vec![1]);
    assert!(platform.state().events.is_empty());
}

/// Full round trip from Argo CD back to Helm: CRDs are handed over, the
/// application is removed, and the workload is redeployed through Helm
/// with its health row cleaned up.
#[tokio::test]
async fn gitops_to_helm_round_trip() {
    let platform = FakePlatform::new();
    let w = platform.install(1, DeploymentBackend::GitOpsController);
    {
        let mut state = platform.state();
        state.crds.insert(
            w.release_name(),
            vec![
                ResourceNode {
                    group: "apiextensions.k8s.io".to_string(),
                    version: "v1".to_string(),
                    kind: "CustomResourceDefinition".to_string(),
                    name: "widgets.example.com".to_string(),
                    namespace: None,
                },
                ResourceNode {
                    group: "apps".to_string(),
                    version: "v1".to_string(),
                    kind: "Deployment".to_string(),
                    name: "svc1".to_string(),
                    namespace: Some("apps".to_string()),
                },
            ],
        );
        state.health.insert(
            (w.app_id, ENV_ID),
            keel_migrate::model::HealthStatus {
                app_id: w.app_id,
                environment_id: ENV_ID,
                status: "Healthy".to_string(),
            },
        );
    }

    let request = MigrationRequest::new(ENV_ID, DeploymentBackend::ReleaseManager, 1);
    let migrator = platform.migrator();
    let cancel = CancellationToken::new();

    let deleted = migrator
        .migrate_deployment_type(&request, &cancel)
        .await
        .unwrap();
    assert!(deleted.is_complete());

    let done = migrator
        .trigger_after_migration(&request, &cancel)
        .await
        .unwrap();
    assert!(done.is_complete());
    assert_eq!(done.successful_workloads[0].status, MigrationStatus::Success);

    let state = platform.state();
    assert_eq!(state.patched, vec!["widgets.example.com".to_string()]);
    assert_eq!(
        state.events,
        vec![(1000 + w.id, DeploymentBackend::ReleaseManager)]
    );
    assert!(state.health.is_empty());
}

/// A release linked in from outside keel is addressed by the name Helm
/// knows it under in both phases.
#[tokio::test]
async fn linked_release_uses_its_real_name_end_to_end() {
    let platform = FakePlatform::new();
    let w = platform.link(1, "billing");
    let request = MigrationRequest::new(ENV_ID, DeploymentBackend::GitOpsController, 1);
    let migrator = platform.migrator();
    let cancel = CancellationToken::new();

    let deleted = migrator
        .migrate_deployment_type(&request, &cancel)
        .await
        .unwrap();
    assert!(deleted.is_complete());
    assert_eq!(deleted.successful_workloads[0].app_name, "billing");
    {
        let state = platform.state();
        assert_eq!(
            state.deletes,
            vec![(DeploymentBackend::ReleaseManager, "billing".to_string())]
        );
        let (config, _) = &state.upserts[0];
        assert_eq!(
            config
                .release_configuration
                .as_ref()
                .map(|rc| rc.release_name.as_str()),
            Some("billing")
        );
    }

    let done = migrator
        .trigger_after_migration(&request, &cancel)
        .await
        .unwrap();
    assert_eq!(done.successful_workloads[0].status, MigrationStatus::Success);

    let state = platform.state();
    assert_eq!(state.lookups, vec!["billing".to_string()]);
    assert_eq!(
        state.events,
        vec![(1000 + w.id, DeploymentBackend::GitOpsController)]
    );
}
