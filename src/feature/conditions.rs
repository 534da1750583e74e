//! Precondition and postcondition implementations
//!
//! Preconditions are one-shot probes (the caller retries the whole cycle);
//! readiness postconditions own their polling and timeout. All checks are
//! side-effect free and repeatable, except the namespace ensure which is
//! an idempotent server-side apply.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::cluster::ClusterClient;
use crate::feature::Check;
use crate::k8s::{has_condition, has_json_condition, poll_until, CONDITION_READY, DEFAULT_POLL_INTERVAL};
use crate::{
    Result, SERVICE_MESH_CONTROL_PLANE_CRD, SERVICE_MESH_MEMBER_API_VERSION,
    SERVICE_MESH_MEMBER_KIND, SERVICE_MESH_MEMBER_NAME,
};

/// Default timeout for the mesh-membership readiness wait
pub const MEMBER_READY_TIMEOUT: Duration = Duration::from_secs(120);

/// Default timeout for the gateway pods readiness wait
pub const PODS_READY_TIMEOUT: Duration = Duration::from_secs(300);

/// Blocks until the service-mesh operator is installed
///
/// Probes for the control-plane CRD; a missing operator is a dependency
/// not yet satisfied, not an error.
pub struct ServiceMeshOperatorInstalled;

#[async_trait]
impl Check for ServiceMeshOperatorInstalled {
    fn name(&self) -> &str {
        "service-mesh-operator-installed"
    }

    async fn evaluate(&self, client: &dyn ClusterClient) -> Result<bool> {
        let installed = client.crd_exists(SERVICE_MESH_CONTROL_PLANE_CRD).await?;
        if !installed {
            debug!(crd = SERVICE_MESH_CONTROL_PLANE_CRD, "service-mesh operator not installed");
        }
        Ok(installed)
    }
}

/// Ensures the target namespace exists, creating it if missing
pub struct EnsureNamespace {
    namespace: String,
}

impl EnsureNamespace {
    /// Ensure `namespace` exists before manifests are applied into it
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl Check for EnsureNamespace {
    fn name(&self) -> &str {
        "ensure-namespace"
    }

    async fn evaluate(&self, client: &dyn ClusterClient) -> Result<bool> {
        client.ensure_namespace(&self.namespace).await?;
        Ok(true)
    }
}

/// Waits until the mesh membership object reports Ready
///
/// Mesh operators typically need an asynchronous grace period to accept
/// membership before dependent objects can schedule.
pub struct ServiceMeshMemberReady {
    namespace: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl ServiceMeshMemberReady {
    /// Wait for the membership of `namespace` with the default timeout
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_timing(namespace, MEMBER_READY_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }

    /// Wait with explicit timeout and poll interval
    pub fn with_timing(
        namespace: impl Into<String>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            timeout,
            poll_interval,
        }
    }
}

#[async_trait]
impl Check for ServiceMeshMemberReady {
    fn name(&self) -> &str {
        "service-mesh-member-ready"
    }

    async fn evaluate(&self, client: &dyn ClusterClient) -> Result<bool> {
        let namespace = self.namespace.as_str();
        poll_until(
            self.timeout,
            self.poll_interval,
            format!("timeout waiting for mesh member in {} to be ready", namespace),
            move || async move {
                let member = client
                    .get_resource(
                        SERVICE_MESH_MEMBER_API_VERSION,
                        SERVICE_MESH_MEMBER_KIND,
                        namespace,
                        SERVICE_MESH_MEMBER_NAME,
                    )
                    .await?;
                Ok(member
                    .as_ref()
                    .map(|m| has_json_condition(m.get("status"), CONDITION_READY))
                    .unwrap_or(false))
            },
        )
        .await?;
        Ok(true)
    }
}

/// Waits until all pods in a namespace report Ready
pub struct PodsReady {
    namespace: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl PodsReady {
    /// Wait for all pods in `namespace` with the default timeout
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_timing(namespace, PODS_READY_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }

    /// Wait with explicit timeout and poll interval
    pub fn with_timing(
        namespace: impl Into<String>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            timeout,
            poll_interval,
        }
    }
}

#[async_trait]
impl Check for PodsReady {
    fn name(&self) -> &str {
        "pods-ready"
    }

    async fn evaluate(&self, client: &dyn ClusterClient) -> Result<bool> {
        let namespace = self.namespace.as_str();
        poll_until(
            self.timeout,
            self.poll_interval,
            format!("timeout waiting for pods in {} to be ready", namespace),
            move || async move {
                let pods = client.list_pods(namespace).await?;
                if pods.is_empty() {
                    return Ok(false);
                }
                Ok(pods.iter().all(|pod| {
                    has_condition(
                        pod.status
                            .as_ref()
                            .and_then(|s| s.conditions.as_deref()),
                        CONDITION_READY,
                    )
                }))
            },
        )
        .await?;
        Ok(true)
    }
}
