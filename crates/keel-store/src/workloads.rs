//! Workload selection and environment lookup

use async_trait::async_trait;

use keel_migrate::model::Environment;
use keel_migrate::ports::{EnvironmentStore, WorkloadStore};
use keel_migrate::{DeploymentBackend, StoreError, Workload};

use crate::error::db_err;
use crate::rows::{EnvironmentRow, WorkloadRow};
use crate::PgStore;

// A workload without an active config has only ever been deployed by Helm
const WORKLOAD_SELECT: &str = r#"
    SELECT ia.id,
           ia.app_id,
           ia.environment_id,
           a.app_name,
           a.display_name,
           e.name AS environment_name,
           e.namespace,
           e.cluster_id,
           COALESCE(dc.deployment_backend, 'helm') AS deployment_backend,
           a.app_type = 'linked' AS linked_release
    FROM installed_apps ia
    JOIN apps a ON a.id = ia.app_id
    JOIN environments e ON e.id = ia.environment_id
    LEFT JOIN deployment_configs dc
           ON dc.app_id = ia.app_id
          AND dc.environment_id = ia.environment_id
          AND dc.active
    WHERE ia.active
"#;

fn into_workloads(rows: Vec<WorkloadRow>) -> Result<Vec<Workload>, StoreError> {
    rows.into_iter().map(Workload::try_from).collect()
}

#[async_trait]
impl WorkloadStore for PgStore {
    async fn select_by_environment_and_backend(
        &self,
        environment_id: i64,
        backend: DeploymentBackend,
        include: &[i64],
        exclude: &[i64],
    ) -> Result<Vec<Workload>, StoreError> {
        let sql = format!(
            r#"{}
              AND ia.environment_id = $1
              AND COALESCE(dc.deployment_backend, 'helm') = $2
              AND (cardinality($3::bigint[]) = 0 OR ia.id = ANY($3))
              AND NOT (ia.id = ANY($4))
            ORDER BY ia.id
            "#,
            WORKLOAD_SELECT
        );
        let rows: Vec<WorkloadRow> = sqlx::query_as(&sql)
            .bind(environment_id)
            .bind(backend.as_str())
            .bind(include)
            .bind(exclude)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        into_workloads(rows)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<Workload>, StoreError> {
        let sql = format!("{} AND ia.id = ANY($1) ORDER BY ia.id", WORKLOAD_SELECT);
        let rows: Vec<WorkloadRow> = sqlx::query_as(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        into_workloads(rows)
    }
}

#[async_trait]
impl EnvironmentStore for PgStore {
    async fn find_environment(
        &self,
        environment_id: i64,
    ) -> Result<Option<Environment>, StoreError> {
        let row: Option<EnvironmentRow> = sqlx::query_as(
            "SELECT id, name, cluster_id, namespace FROM environments WHERE id = $1",
        )
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(Environment::from))
    }
}
