//! Patching arbitrary resources on workload clusters

use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::discovery::ApiResource;
use tracing::debug;

use keel_common::kube_utils::{build_api_resource, pluralize_kind};
use keel_common::{ClusterRegistry, FIELD_MANAGER};
use keel_migrate::model::{PatchType, ResourceNode};
use keel_migrate::ports::K8sPatcher;
use keel_migrate::BackendError;

use crate::error::{from_common, from_kube};

/// [`K8sPatcher`] over dynamic objects
pub struct KubePatcher {
    clusters: Arc<ClusterRegistry>,
}

impl KubePatcher {
    /// Create a patcher resolving clusters through `clusters`
    pub fn new(clusters: Arc<ClusterRegistry>) -> Self {
        Self { clusters }
    }
}

/// API resource addressing a resource tree node
pub fn node_resource(node: &ResourceNode) -> ApiResource {
    build_api_resource(&node.group, &node.version, &node.kind, &pluralize_kind(&node.kind))
}

#[async_trait]
impl K8sPatcher for KubePatcher {
    async fn patch_resource(
        &self,
        cluster_id: i64,
        patch_type: PatchType,
        payload: &serde_json::Value,
        resource: &ResourceNode,
    ) -> Result<(), BackendError> {
        let client = self.clusters.client(cluster_id).await.map_err(from_common)?;
        let ar = node_resource(resource);
        let api: Api<DynamicObject> = match &resource.namespace {
            Some(ns) => Api::namespaced_with(client, ns, &ar),
            None => Api::all_with(client, &ar),
        };

        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        let patch = match patch_type {
            PatchType::StrategicMerge => Patch::Strategic(payload),
            PatchType::Merge => Patch::Merge(payload),
        };

        api.patch(&resource.name, &params, &patch)
            .await
            .map_err(|e| from_kube(&format!("{}/{}", resource.kind, resource.name), e))?;
        debug!(cluster_id, kind = %resource.kind, name = %resource.name, "Patched resource");
        Ok(())
    }
}
