//! Routing capability: registration and orchestration
//!
//! Consumer components enroll routing targets during platform startup;
//! the platform's controller loop invokes `reconcile` once per cycle. The
//! capability holds no cluster-derived state: every cycle re-derives RBAC
//! and the feature pipeline from the current registration set, so repeated
//! reconciliations converge rather than duplicate.

use std::sync::RwLock;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;
use tracing::{debug, info, instrument};

use crate::cluster::ClusterClient;
use crate::config::{IngressConfig, RoutingSpec};
use crate::feature::conditions::{
    EnsureNamespace, PodsReady, ServiceMeshMemberReady, ServiceMeshOperatorInstalled,
};
use crate::feature::handler::{FeaturesHandler, Source};
use crate::feature::Feature;
use crate::owner::as_owner_ref;
use crate::rbac::create_or_update_platform_rbac;
use crate::target::{ResourceReference, RoutingTarget};
use crate::{manifest, Error, Result, ROUTING_RESOURCES_WATCHER_ROLE};

/// The platform's ingress routing capability
///
/// Registration (`expose`) may be called concurrently from independent
/// component initialization paths; the target list is guarded internally.
/// `reconcile` must be invoked single-flight per instance, typically from
/// a controller's per-object processing queue.
pub struct RoutingCapability {
    available: bool,
    routing_spec: RoutingSpec,
    targets: RwLock<Vec<RoutingTarget>>,
}

impl RoutingCapability {
    /// Create the capability with its static spec and availability flag
    ///
    /// `available` states whether this platform build offers routing at
    /// all, independent of demand; it is immutable afterwards.
    pub fn new(spec: RoutingSpec, available: bool) -> Self {
        Self {
            available,
            routing_spec: spec,
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Whether the platform build offers this capability
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Enroll resources to be exposed through the ingress gateway
    ///
    /// Best-effort additive: no validation, no deduplication, no error.
    /// Callable any number of times from any number of components before
    /// reconciliation; availability is deliberately not checked here.
    pub fn expose(&self, targets: impl IntoIterator<Item = RoutingTarget>) {
        // The list is append-only, so a poisoned lock cannot hold an
        // inconsistent value; recover the guard and keep going.
        let mut guard = self
            .targets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.extend(targets);
    }

    /// Whether at least one target has been enrolled
    pub fn is_required(&self) -> bool {
        !self.read_targets().is_empty()
    }

    /// Snapshot of the current target sequence, in enrollment order
    pub fn routing_targets(&self) -> Vec<RoutingTarget> {
        self.read_targets().clone()
    }

    /// Transport-facing projection of the static routing spec
    pub fn ingress_config(&self) -> IngressConfig {
        let gateway = &self.routing_spec.ingress_gateway;
        IngressConfig {
            ingress_selector_label: gateway.label_selector_key.clone(),
            ingress_selector_value: gateway.label_selector_value.clone(),
            ingress_service: gateway.name.clone(),
            gateway_namespace: gateway.namespace.clone(),
        }
    }

    /// Reconcile routing configuration against the cluster
    ///
    /// Ordered steps: availability policy, owner resolution, RBAC
    /// synthesis, then the feature pipeline. RBAC is written first
    /// because feature manifests assume the watch role already exists.
    /// Partial progress is safe to leave in place; the next call
    /// converges.
    #[instrument(skip_all, fields(capability = "routing"))]
    pub async fn reconcile<O>(&self, client: &dyn ClusterClient, owner: &O) -> Result<()>
    where
        O: Resource<DynamicType = ()> + Sync,
    {
        // Snapshot once; predicates and RBAC below see one consistent
        // registration state for the whole cycle.
        let targets = self.routing_targets();
        let required = !targets.is_empty();

        if required && !self.available {
            return Err(Error::configuration(
                "routing capability is required by registered components but is not available \
                 in this platform build",
            ));
        }

        let owner_ref = as_owner_ref(owner).map_err(|e| {
            Error::configuration(format!(
                "failed to resolve owner while reconciling routing capability: {}",
                e
            ))
        })?;

        let references: Vec<ResourceReference> =
            targets.iter().map(|t| t.reference.clone()).collect();
        create_or_update_platform_rbac(
            client,
            ROUTING_RESOURCES_WATCHER_ROLE,
            &references,
            &self.routing_spec.ingress_gateway.namespace,
            &owner_ref,
        )
        .await?;

        let handler = FeaturesHandler::new(
            self.routing_spec.ingress_gateway.namespace.clone(),
            Source::platform_capability("routing"),
            self.routing_features(&owner_ref, required)?,
        );
        let reports = handler.apply(client).await?;

        debug!(features = reports.len(), targets = targets.len(), "pipeline completed");
        info!(required, targets = targets.len(), "routing capability reconciled");
        Ok(())
    }

    /// Translate current state into the ordered feature set
    ///
    /// Namespace/membership setup must precede gateway creation: the
    /// gateway deployment cannot schedule until the mesh operator has
    /// accepted the namespace, which is why the two halves are separate
    /// features with their own readiness gates.
    fn routing_features(&self, owner: &OwnerReference, required: bool) -> Result<Vec<Feature>> {
        let data = serde_json::to_value(&self.routing_spec)
            .map_err(|e| Error::serialization_for_kind("RoutingSpec", e.to_string()))?;
        let namespace = self.routing_spec.ingress_gateway.namespace.clone();

        Ok(vec![
            Feature::define("mesh-ingress-ns-creation")
                .manifests([manifest::SERVICE_MESH_MEMBER])
                .with_data(data.clone())
                .enabled_when(move || required)
                .owned_by(owner.clone())
                .managed()
                .pre_condition(ServiceMeshOperatorInstalled)
                .pre_condition(EnsureNamespace::new(namespace.clone()))
                .post_condition(ServiceMeshMemberReady::new(namespace.clone()))
                .build(),
            Feature::define("mesh-ingress-creation")
                .manifests([
                    manifest::INGRESS_SERVICE,
                    manifest::INGRESS_ROLE,
                    manifest::INGRESS_ROLE_BINDING,
                    manifest::INGRESS_DEPLOYMENT,
                    manifest::INGRESS_GATEWAY,
                    manifest::INGRESS_NETWORK_POLICY,
                ])
                .with_data(data)
                .enabled_when(move || required)
                .owned_by(owner.clone())
                .managed()
                .pre_condition(ServiceMeshOperatorInstalled)
                .pre_condition(EnsureNamespace::new(namespace.clone()))
                .post_condition(PodsReady::new(namespace))
                .build(),
        ])
    }

    fn read_targets(&self) -> std::sync::RwLockReadGuard<'_, Vec<RoutingTarget>> {
        self.targets
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
