//! Fixtures shared by unit tests

use crate::model::{DeploymentBackend, Environment, Workload};

/// A managed workload on the release manager in environment 7
pub(crate) fn workload(id: i64) -> Workload {
    Workload {
        id,
        app_id: id * 10,
        environment_id: 7,
        app_name: format!("app{}", id),
        display_name: None,
        environment_name: "staging".to_string(),
        namespace: "apps".to_string(),
        cluster_id: 1,
        current_backend: DeploymentBackend::ReleaseManager,
        linked_release: false,
    }
}

/// A managed workload on the GitOps controller in environment 7
pub(crate) fn gitops_workload(id: i64) -> Workload {
    Workload {
        current_backend: DeploymentBackend::GitOpsController,
        ..workload(id)
    }
}

/// Environment 7 on cluster 1
pub(crate) fn environment() -> Environment {
    Environment {
        id: 7,
        name: "staging".to_string(),
        cluster_id: 1,
        namespace: "apps".to_string(),
    }
}
