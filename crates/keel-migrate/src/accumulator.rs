//! Building per-workload result records
//!
//! Pure data shaping. Workers return one [`ChangeStatus`] each and the
//! orchestrator partitions them once at the end, so no list is shared
//! between workers.

use crate::model::{ChangeStatus, DeploymentBackend, MigrationResponse, MigrationStatus, Workload};

/// What happened to one workload in one phase
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Step succeeded with the given status
    Succeeded(MigrationStatus),
    /// Step failed
    Failed {
        /// Coarse classification
        status: MigrationStatus,
        /// Human-readable reason
        reason: String,
    },
}

impl Outcome {
    /// Generic failure
    pub fn failed(reason: impl Into<String>) -> Self {
        Outcome::Failed {
            status: MigrationStatus::Failed,
            reason: reason.into(),
        }
    }

    /// Failure with a specific status
    pub fn failed_with(status: MigrationStatus, reason: impl Into<String>) -> Self {
        Outcome::Failed {
            status,
            reason: reason.into(),
        }
    }
}

/// Record for `workload` with `outcome`
pub fn change_status(workload: &Workload, outcome: Outcome) -> ChangeStatus {
    let (status, error) = match outcome {
        Outcome::Succeeded(status) => (status, String::new()),
        Outcome::Failed { status, reason } => (status, reason),
    };
    ChangeStatus {
        workload_id: workload.id,
        app_id: workload.app_id,
        app_name: workload.app_name.clone(),
        environment_id: workload.environment_id,
        environment_name: workload.environment_name.clone(),
        error,
        status,
    }
}

/// Collects records into the successful and failed lists
#[derive(Debug)]
pub struct PartialFailureAccumulator {
    response: MigrationResponse,
}

impl PartialFailureAccumulator {
    /// Start an empty response
    pub fn new(environment_id: i64, desired_backend: DeploymentBackend) -> Self {
        Self {
            response: MigrationResponse::empty(environment_id, desired_backend),
        }
    }

    /// Record the outcome for one workload
    pub fn record(&mut self, workload: &Workload, outcome: Outcome) {
        self.push(change_status(workload, outcome));
    }

    /// File an already built record into the right list
    pub fn push(&mut self, change: ChangeStatus) {
        if change.error.is_empty() && change.status.is_success() {
            self.response.successful_workloads.push(change);
        } else {
            self.response.failed_workloads.push(change);
        }
    }

    /// Move a successful workload to the failed list
    pub fn demote(&mut self, workload_id: i64, status: MigrationStatus, reason: impl Into<String>) {
        if let Some(pos) = self
            .response
            .successful_workloads
            .iter()
            .position(|c| c.workload_id == workload_id)
        {
            let mut change = self.response.successful_workloads.remove(pos);
            change.status = status;
            change.error = reason.into();
            self.response.failed_workloads.push(change);
        }
    }

    /// Ids of workloads currently in the successful list
    pub fn successful_ids(&self) -> Vec<i64> {
        self.response
            .successful_workloads
            .iter()
            .map(|c| c.workload_id)
            .collect()
    }

    /// Finish, ordering both lists by workload id
    pub fn finish(mut self) -> MigrationResponse {
        self.response
            .successful_workloads
            .sort_by_key(|c| c.workload_id);
        self.response.failed_workloads.sort_by_key(|c| c.workload_id);
        self.response
    }
}
