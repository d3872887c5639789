//! GitOps health rows

use async_trait::async_trait;

use keel_migrate::model::HealthStatus;
use keel_migrate::ports::HealthStatusStore;
use keel_migrate::StoreError;

use crate::error::db_err;
use crate::PgStore;

#[async_trait]
impl HealthStatusStore for PgStore {
    async fn get(
        &self,
        app_id: i64,
        environment_id: i64,
    ) -> Result<Option<HealthStatus>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM app_health_status WHERE app_id = $1 AND environment_id = $2",
        )
        .bind(app_id)
        .bind(environment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|(status,)| HealthStatus {
            app_id,
            environment_id,
            status,
        }))
    }

    async fn delete(&self, app_id: i64, environment_id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("DELETE FROM app_health_status WHERE app_id = $1 AND environment_id = $2")
                .bind(app_id)
                .bind(environment_id)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "health status for app {} in environment {}",
                app_id, environment_id
            )));
        }
        Ok(())
    }
}
