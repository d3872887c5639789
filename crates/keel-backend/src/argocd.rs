//! GitOps controller adapter over Argo CD `Application` resources

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use serde_json::json;
use tracing::{debug, info};

use keel_common::kube_utils::build_api_resource;
use keel_common::{ClusterRegistry, FIELD_MANAGER};
use keel_migrate::model::{AppStatus, ResourceNode};
use keel_migrate::ports::GitOpsControllerAdapter;
use keel_migrate::BackendError;

use crate::error::{from_common, from_kube};

/// Namespace Argo CD is installed into by default
pub const DEFAULT_ARGOCD_NAMESPACE: &str = "argocd";

/// Finalizer that makes Argo CD delete an application's resources with it
pub const RESOURCES_FINALIZER: &str = "resources-finalizer.argocd.argoproj.io";

/// Argo CD Application API resource
pub fn application_resource() -> ApiResource {
    build_api_resource("argoproj.io", "v1alpha1", "Application", "applications")
}

/// [`GitOpsControllerAdapter`] talking to Argo CD through the Kubernetes API
pub struct ArgoCdController {
    clusters: Arc<ClusterRegistry>,
    cluster_id: i64,
    namespace: String,
}

impl ArgoCdController {
    /// Argo CD installed in `namespace` on `cluster_id`
    pub fn new(clusters: Arc<ClusterRegistry>, cluster_id: i64, namespace: impl Into<String>) -> Self {
        Self {
            clusters,
            cluster_id,
            namespace: namespace.into(),
        }
    }

    async fn api(&self) -> Result<Api<DynamicObject>, BackendError> {
        let client = self
            .clusters
            .client(self.cluster_id)
            .await
            .map_err(from_common)?;
        Ok(Api::namespaced_with(
            client,
            &self.namespace,
            &application_resource(),
        ))
    }

    async fn get(&self, app_name: &str) -> Result<DynamicObject, BackendError> {
        self.api()
            .await?
            .get(app_name)
            .await
            .map_err(|e| from_kube(&format!("application {}", app_name), e))
    }
}

#[async_trait]
impl GitOpsControllerAdapter for ArgoCdController {
    async fn delete(&self, app_name: &str, cascade: bool) -> Result<(), BackendError> {
        let api = self.api().await?;
        let what = format!("application {}", app_name);

        if cascade {
            let app = api.get(app_name).await.map_err(|e| from_kube(&what, e))?;
            if let Some(finalizers) = with_finalizer(app.metadata.finalizers.as_deref()) {
                debug!(application = %app_name, "Adding resources finalizer");
                let params = PatchParams {
                    field_manager: Some(FIELD_MANAGER.to_string()),
                    ..Default::default()
                };
                api.patch(
                    app_name,
                    &params,
                    &Patch::Merge(json!({ "metadata": { "finalizers": finalizers } })),
                )
                .await
                .map_err(|e| from_kube(&what, e))?;
            }
        }

        api.delete(app_name, &DeleteParams::default())
            .await
            .map_err(|e| from_kube(&what, e))?;
        info!(application = %app_name, cascade, "Argo CD application deleted");
        Ok(())
    }

    async fn get_by_name(&self, app_name: &str) -> Result<AppStatus, BackendError> {
        Ok(app_status(&self.get(app_name).await?))
    }

    async fn get_resource_tree(&self, app_name: &str) -> Result<Vec<ResourceNode>, BackendError> {
        Ok(resource_nodes(&self.get(app_name).await?))
    }
}

/// Finalizer list with the resources finalizer added, `None` if present
fn with_finalizer(existing: Option<&[String]>) -> Option<Vec<String>> {
    let existing = existing.unwrap_or_default();
    if existing.iter().any(|f| f == RESOURCES_FINALIZER) {
        return None;
    }
    let mut finalizers = existing.to_vec();
    finalizers.push(RESOURCES_FINALIZER.to_string());
    Some(finalizers)
}

fn status_field(app: &DynamicObject, pointer: &str) -> String {
    app.data
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string()
}

/// Health and sync state of an application
pub fn app_status(app: &DynamicObject) -> AppStatus {
    AppStatus {
        name: app.metadata.name.clone().unwrap_or_default(),
        health: status_field(app, "/status/health/status"),
        sync: status_field(app, "/status/sync/status"),
    }
}

/// Resources listed in an application's status
pub fn resource_nodes(app: &DynamicObject) -> Vec<ResourceNode> {
    let Some(resources) = app.data.pointer("/status/resources").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    resources
        .iter()
        .filter_map(|r| {
            let field = |key: &str| r.get(key).and_then(|v| v.as_str()).map(str::to_string);
            Some(ResourceNode {
                group: field("group").unwrap_or_default(),
                version: field("version")?,
                kind: field("kind")?,
                name: field("name")?,
                namespace: field("namespace").filter(|ns| !ns.is_empty()),
            })
        })
        .collect()
}
