//! Deployment backend migration engine
//!
//! Moves workloads between a Helm release manager and an Argo CD GitOps
//! controller in two phases:
//!
//! 1. [`Migrator::migrate_deployment_type`] checks the cluster answers,
//!    prepares CRDs when moving to Helm, deletes each workload from its old
//!    backend and flips its deployment config.
//! 2. [`Migrator::trigger_after_migration`] confirms the old backend no
//!    longer has each workload and submits a redeploy on the new one.
//!
//! Every selected workload ends up in exactly one of the response's
//! successful or failed lists. Only conditions that stop a whole batch are
//! returned as [`MigrationError`].

#![deny(missing_docs)]

pub mod accumulator;
pub mod backend;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod ports;
pub mod prepare;
pub mod reconcile;
pub mod redeploy;
pub mod verify;

#[cfg(test)]
mod testing;

pub use backend::{BackendAdapter, Backends};
pub use error::{BackendError, InconsistentWorkload, MigrationError, StoreError};
pub use model::{
    ChangeStatus, DeploymentBackend, MigrationRequest, MigrationResponse, MigrationStatus, Workload,
};
pub use orchestrator::{MigrationConfig, MigrationContext, Migrator};
