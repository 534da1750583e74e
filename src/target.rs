//! Registration data types
//!
//! A `RoutingTarget` is what a consumer component hands to the capability:
//! a reference to the cluster object it wants exposed through ingress, plus
//! the name of the contributing component (used for audit labels only).

use serde::{Deserialize, Serialize};

/// Opaque identifier of a cluster object.
///
/// Used both as the subject-of-access when synthesizing watch RBAC and as
/// an input to manifest rendering. `resource` is the lowercase plural form
/// the RBAC API expects (e.g. "services", "inferenceservices").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    /// API group of the resource ("" for the core group)
    #[serde(default)]
    pub group: String,
    /// Lowercase plural resource name (e.g. "services")
    pub resource: String,
    /// Object name
    pub name: String,
    /// Object namespace, if namespaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ResourceReference {
    /// Reference a namespaced resource
    pub fn namespaced(
        group: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            resource: resource.into(),
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

/// A consumer component's routing enrollment.
///
/// Owned by the component that contributed it; the capability aggregates
/// targets and never mutates them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingTarget {
    /// The cluster object to expose through the ingress gateway
    pub reference: ResourceReference,
    /// Name of the contributing component (labels/auditing only)
    pub component: String,
}

impl RoutingTarget {
    /// Create a target for the given reference, attributed to `component`
    pub fn new(reference: ResourceReference, component: impl Into<String>) -> Self {
        Self {
            reference,
            component: component.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespaced_reference() {
        let r = ResourceReference::namespaced("serving.example.io", "models", "model-a", "team-a");
        assert_eq!(r.group, "serving.example.io");
        assert_eq!(r.resource, "models");
        assert_eq!(r.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let t = RoutingTarget::new(
            ResourceReference::namespaced("", "services", "model-a", "team-a"),
            "model-serving",
        );
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["reference"]["resource"], "services");
        assert_eq!(json["component"], "model-serving");
        let back: RoutingTarget = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}
