//! Versions, deployment bookkeeping and the redeploy outbox

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use keel_migrate::model::WorkloadVersion;
use keel_migrate::ports::{DeploymentHistoryStore, RedeployTrigger};
use keel_migrate::{DeploymentBackend, StoreError};

use crate::error::db_err;
use crate::PgStore;

#[async_trait]
impl DeploymentHistoryStore for PgStore {
    async fn latest_version(
        &self,
        workload_id: i64,
    ) -> Result<Option<WorkloadVersion>, StoreError> {
        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT id, workload_id, artifact_id
            FROM workload_versions
            WHERE workload_id = $1
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(workload_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(id, workload_id, artifact_id)| WorkloadVersion {
            id,
            workload_id,
            artifact_id,
        }))
    }

    async fn mark_deployed(
        &self,
        version: &WorkloadVersion,
        backend: DeploymentBackend,
        actor_id: i32,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        match backend {
            DeploymentBackend::ReleaseManager => {
                let result = sqlx::query(
                    "UPDATE workload_versions SET last_deployed_on = $2, last_deployed_by = $3 WHERE id = $1",
                )
                .bind(version.id)
                .bind(at)
                .bind(actor_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
                if result.rows_affected() == 0 {
                    return Err(StoreError::NotFound(format!(
                        "workload version {}",
                        version.id
                    )));
                }
            }
            DeploymentBackend::GitOpsController => {
                sqlx::query(
                    r#"
                    INSERT INTO deployment_history
                        (workload_version_id, deployment_backend, deployed_by, deployed_on)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(version.id)
                .bind(backend.as_str())
                .bind(actor_id)
                .bind(at)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RedeployTrigger for PgStore {
    async fn submit_deployment_event(
        &self,
        workload_version_id: i64,
        backend: DeploymentBackend,
        actor_id: i32,
    ) -> Result<(), StoreError> {
        let (event_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO deployment_events (workload_version_id, deployment_backend, actor_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(workload_version_id)
        .bind(backend.as_str())
        .bind(actor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(event_id, workload_version_id, backend = %backend, "Deployment event queued");
        Ok(())
    }
}
