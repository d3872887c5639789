//! Deployment config persistence

use async_trait::async_trait;
use sqlx::types::Json;
use tracing::debug;

use keel_migrate::model::{DeploymentConfig, OfferingMode};
use keel_migrate::ports::DeploymentConfigStore;
use keel_migrate::{DeploymentBackend, StoreError};

use crate::error::db_err;
use crate::rows::DeploymentConfigRow;
use crate::PgStore;

const CONFIG_COLUMNS: &str =
    "id, app_id, environment_id, deployment_backend, release_configuration, active";

#[async_trait]
impl DeploymentConfigStore for PgStore {
    async fn get_or_create(
        &self,
        app_id: i64,
        environment_id: i64,
        current: DeploymentBackend,
    ) -> Result<DeploymentConfig, StoreError> {
        let sql = format!(
            "SELECT {} FROM deployment_configs WHERE app_id = $1 AND environment_id = $2 AND active",
            CONFIG_COLUMNS
        );
        let row: Option<DeploymentConfigRow> = sqlx::query_as(&sql)
            .bind(app_id)
            .bind(environment_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => DeploymentConfig::try_from(row),
            // Written by the reconcile transaction in `upsert`
            None => Ok(DeploymentConfig {
                id: None,
                app_id,
                environment_id,
                deployment_backend: current,
                release_configuration: None,
                active: true,
            }),
        }
    }

    async fn upsert(
        &self,
        config: &DeploymentConfig,
        offering: Option<OfferingMode>,
        actor_id: i32,
    ) -> Result<DeploymentConfig, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let release_configuration = config.release_configuration.clone().map(Json);
        let sql = format!(
            r#"
            INSERT INTO deployment_configs
                (app_id, environment_id, deployment_backend, release_configuration, active, created_by, updated_by, updated_on)
            VALUES ($1, $2, $3, $4, TRUE, $5, $5, NOW())
            ON CONFLICT (app_id, environment_id) WHERE active DO UPDATE
            SET deployment_backend = EXCLUDED.deployment_backend,
                release_configuration = EXCLUDED.release_configuration,
                updated_by = EXCLUDED.updated_by,
                updated_on = EXCLUDED.updated_on
            RETURNING {}
            "#,
            CONFIG_COLUMNS
        );
        let row: DeploymentConfigRow = sqlx::query_as(&sql)
            .bind(config.app_id)
            .bind(config.environment_id)
            .bind(config.deployment_backend.as_str())
            .bind(release_configuration)
            .bind(actor_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;

        if let Some(mode) = offering {
            sqlx::query(
                "UPDATE apps SET offering_mode = $2, updated_by = $3, updated_on = NOW() WHERE id = $1",
            )
            .bind(config.app_id)
            .bind(mode.as_str())
            .bind(actor_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        debug!(
            app_id = config.app_id,
            environment_id = config.environment_id,
            backend = %config.deployment_backend,
            "Deployment config saved"
        );
        DeploymentConfig::try_from(row)
    }
}
