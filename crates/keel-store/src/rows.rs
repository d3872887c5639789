//! Row types and their conversion into engine models

use sqlx::types::Json;

use keel_migrate::model::{DeploymentConfig, Environment, ReleaseConfiguration};
use keel_migrate::{DeploymentBackend, StoreError, Workload};

pub(crate) fn parse_backend(value: &str) -> Result<DeploymentBackend, StoreError> {
    value
        .parse()
        .map_err(|e: String| StoreError::Database(format!("invalid deployment_backend: {}", e)))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct WorkloadRow {
    pub id: i64,
    pub app_id: i64,
    pub environment_id: i64,
    pub app_name: String,
    pub display_name: Option<String>,
    pub environment_name: String,
    pub namespace: String,
    pub cluster_id: i64,
    pub deployment_backend: String,
    pub linked_release: bool,
}

impl TryFrom<WorkloadRow> for Workload {
    type Error = StoreError;

    fn try_from(row: WorkloadRow) -> Result<Self, Self::Error> {
        Ok(Workload {
            id: row.id,
            app_id: row.app_id,
            environment_id: row.environment_id,
            app_name: row.app_name,
            display_name: row.display_name,
            environment_name: row.environment_name,
            namespace: row.namespace,
            cluster_id: row.cluster_id,
            current_backend: parse_backend(&row.deployment_backend)?,
            linked_release: row.linked_release,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct EnvironmentRow {
    pub id: i64,
    pub name: String,
    pub cluster_id: i64,
    pub namespace: String,
}

impl From<EnvironmentRow> for Environment {
    fn from(row: EnvironmentRow) -> Self {
        Environment {
            id: row.id,
            name: row.name,
            cluster_id: row.cluster_id,
            namespace: row.namespace,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct DeploymentConfigRow {
    pub id: i64,
    pub app_id: i64,
    pub environment_id: i64,
    pub deployment_backend: String,
    pub release_configuration: Option<Json<ReleaseConfiguration>>,
    pub active: bool,
}

impl TryFrom<DeploymentConfigRow> for DeploymentConfig {
    type Error = StoreError;

    fn try_from(row: DeploymentConfigRow) -> Result<Self, Self::Error> {
        Ok(DeploymentConfig {
            id: Some(row.id),
            app_id: row.app_id,
            environment_id: row.environment_id,
            deployment_backend: parse_backend(&row.deployment_backend)?,
            release_configuration: row.release_configuration.map(|Json(rc)| rc),
            active: row.active,
        })
    }
}
