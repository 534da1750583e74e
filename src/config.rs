//! Static routing configuration
//!
//! Supplied by platform configuration at construction time, never by
//! consumer components. Immutable for the capability's lifetime. The same
//! structure doubles as the data context handed to manifest rendering.

use serde::{Deserialize, Serialize};

/// Static configuration for the routing capability
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingSpec {
    /// The ingress gateway this capability manages
    pub ingress_gateway: IngressGatewaySpec,
    /// The mesh control plane the gateway namespace enrolls into
    pub control_plane: ControlPlaneRef,
}

/// Description of the ingress gateway workload and its selection labels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressGatewaySpec {
    /// Namespace the gateway and its supporting objects live in
    pub namespace: String,
    /// Name of the gateway service and deployment
    pub name: String,
    /// Label key selecting gateway pods
    pub label_selector_key: String,
    /// Label value selecting gateway pods
    pub label_selector_value: String,
}

/// Reference to the service-mesh control plane
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneRef {
    /// Control plane name (e.g. "basic")
    pub name: String,
    /// Namespace the control plane runs in (e.g. "istio-system")
    pub namespace: String,
}

/// Read-only, transport-facing projection of the routing spec.
///
/// What other platform subsystems need to know to route traffic through
/// the gateway, without access to the full capability state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressConfig {
    /// Label key selecting gateway pods
    pub ingress_selector_label: String,
    /// Label value selecting gateway pods
    pub ingress_selector_value: String,
    /// Name of the gateway service
    pub ingress_service: String,
    /// Namespace the gateway runs in
    pub gateway_namespace: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_spec() -> RoutingSpec {
        RoutingSpec {
            ingress_gateway: IngressGatewaySpec {
                namespace: "mesh-ingress".to_string(),
                name: "mesh-ingress-gateway".to_string(),
                label_selector_key: "istio".to_string(),
                label_selector_value: "mesh-ingress-gateway".to_string(),
            },
            control_plane: ControlPlaneRef {
                name: "basic".to_string(),
                namespace: "istio-system".to_string(),
            },
        }
    }

    #[test]
    fn test_spec_deserializes_from_platform_config() {
        let raw = r#"{
            "ingressGateway": {
                "namespace": "mesh-ingress",
                "name": "mesh-ingress-gateway",
                "labelSelectorKey": "istio",
                "labelSelectorValue": "mesh-ingress-gateway"
            },
            "controlPlane": { "name": "basic", "namespace": "istio-system" }
        }"#;
        let spec: RoutingSpec = serde_json::from_str(raw).unwrap();
        assert_eq!(spec, sample_spec());
    }

    #[test]
    fn test_data_context_uses_camel_case_keys() {
        // Templates reference ${ingressGateway.labelSelectorKey} etc.
        let value = serde_json::to_value(sample_spec()).unwrap();
        assert_eq!(value["ingressGateway"]["labelSelectorKey"], "istio");
        assert_eq!(value["controlPlane"]["namespace"], "istio-system");
    }
}
