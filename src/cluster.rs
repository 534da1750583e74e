//! Cluster client contract
//!
//! The capability talks to the cluster through this narrow trait so the
//! pipeline and RBAC synthesis can be exercised in tests without a live
//! API server. The real implementation wraps `kube::Client`; all writes go
//! through server-side apply so repeated reconciliations converge instead
//! of duplicating objects.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, DynamicObject, ListParams, Patch, PatchParams};
use kube::Client;
use serde_json::Value;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use crate::k8s::build_api_resource;
use crate::{Error, Result, FIELD_MANAGER};

/// Narrow cluster contract consumed by the capability
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Upsert an arbitrary manifest via server-side apply
    ///
    /// The manifest must carry apiVersion, kind, and metadata.name; a
    /// namespace is required for namespaced resources.
    async fn apply(&self, manifest: &Value) -> Result<()>;

    /// Ensure a namespace exists (idempotent)
    async fn ensure_namespace(&self, name: &str) -> Result<()>;

    /// Check whether a CRD is installed
    async fn crd_exists(&self, name: &str) -> Result<bool>;

    /// Get an arbitrary namespaced object, returning `None` when it does
    /// not exist
    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>>;

    /// List pods in a namespace
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;
}

/// Real cluster client wrapping `kube::Client`
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Create a new client wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn apply(&self, manifest: &Value) -> Result<()> {
        let api_version = manifest
            .get("apiVersion")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::serialization("manifest missing apiVersion"))?;
        let kind = manifest
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::serialization("manifest missing kind"))?;
        let name = manifest
            .pointer("/metadata/name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::serialization("manifest missing metadata.name"))?;
        let namespace = manifest.pointer("/metadata/namespace").and_then(|v| v.as_str());

        let ar = build_api_resource(api_version, kind);
        let params = PatchParams::apply(FIELD_MANAGER).force();
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };

        debug!(kind = %kind, name = %name, namespace = ?namespace, "applying manifest");
        api.patch(name, &params, &Patch::Apply(manifest)).await?;
        Ok(())
    }

    async fn ensure_namespace(&self, name: &str) -> Result<()> {
        use k8s_openapi::api::core::v1::Namespace;

        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": { "name": name }
        });
        api.patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&ns))
            .await?;
        Ok(())
    }

    async fn crd_exists(&self, name: &str) -> Result<bool> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        match api.get(name).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_resource(
        &self,
        api_version: &str,
        kind: &str,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>> {
        let ar = build_api_resource(api_version, kind);
        let api: Api<DynamicObject> = Api::namespaced_with(self.client.clone(), namespace, &ar);

        match api.get(name).await {
            Ok(obj) => {
                trace!(kind = %kind, name = %name, "fetched resource");
                let value = serde_json::to_value(&obj)
                    .map_err(|e| Error::serialization_for_kind(kind, e.to_string()))?;
                Ok(Some(value))
            }
            Err(kube::Error::Api(e)) if e.code == 404 => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api.list(&ListParams::default()).await?;
        Ok(pods.items)
    }
}
