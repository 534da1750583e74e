//! Embedded manifest sources
//!
//! Manifest templates are compiled into the binary and rendered against the
//! routing spec at apply time. After rendering, every manifest is decorated
//! with the owner reference and the capability's provenance labels before
//! being handed to the cluster client.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde_json::Value;

use crate::template::{parse_yaml, TemplateEngine, TemplateError};
use crate::Error;

/// A named manifest template
#[derive(Clone, Copy, Debug)]
pub struct ManifestSource {
    /// Template path, used in error messages
    pub name: &'static str,
    template: &'static str,
}

impl ManifestSource {
    /// Create a manifest source from an embedded template
    pub const fn new(name: &'static str, template: &'static str) -> Self {
        Self { name, template }
    }

    /// Render this template with the given data context into an
    /// apply-ready JSON manifest
    pub fn render(&self, engine: &TemplateEngine, data: &Value) -> Result<Value, TemplateError> {
        let rendered = engine.render(self.template, data)?;
        let value = parse_yaml(&rendered)?;
        if value.is_object() {
            Ok(value)
        } else {
            Err(TemplateError::NotAnObject(self.name.to_string()))
        }
    }
}

/// Mesh membership declaration for the gateway namespace
pub const SERVICE_MESH_MEMBER: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/servicemeshmember.yaml",
    include_str!("../templates/servicemesh-ingress/servicemeshmember.yaml"),
);

/// Gateway service
pub const INGRESS_SERVICE: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/service.yaml",
    include_str!("../templates/servicemesh-ingress/service.yaml"),
);

/// Gateway pod role
pub const INGRESS_ROLE: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/role.yaml",
    include_str!("../templates/servicemesh-ingress/role.yaml"),
);

/// Gateway pod role binding
pub const INGRESS_ROLE_BINDING: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/rolebinding.yaml",
    include_str!("../templates/servicemesh-ingress/rolebinding.yaml"),
);

/// Gateway deployment
pub const INGRESS_DEPLOYMENT: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/deployment.yaml",
    include_str!("../templates/servicemesh-ingress/deployment.yaml"),
);

/// Mesh gateway object
pub const INGRESS_GATEWAY: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/gateway.yaml",
    include_str!("../templates/servicemesh-ingress/gateway.yaml"),
);

/// Gateway network policy
pub const INGRESS_NETWORK_POLICY: ManifestSource = ManifestSource::new(
    "servicemesh-ingress/networkpolicy.yaml",
    include_str!("../templates/servicemesh-ingress/networkpolicy.yaml"),
);

/// Attach provenance labels and the owner reference to a rendered manifest
///
/// Labels already present in the template win over injected ones only for
/// keys outside the platform prefix; platform labels are always set.
pub fn decorate(
    manifest: &mut Value,
    owner: Option<&OwnerReference>,
    labels: &BTreeMap<String, String>,
) -> Result<(), Error> {
    let metadata = manifest
        .as_object_mut()
        .and_then(|m| {
            if !m.contains_key("metadata") {
                m.insert("metadata".to_string(), Value::Object(Default::default()));
            }
            m.get_mut("metadata")
        })
        .and_then(|m| m.as_object_mut())
        .ok_or_else(|| Error::serialization("manifest metadata is not a mapping"))?;

    if !labels.is_empty() {
        let label_map = metadata
            .entry("labels".to_string())
            .or_insert_with(|| Value::Object(Default::default()));
        let label_map = label_map
            .as_object_mut()
            .ok_or_else(|| Error::serialization("manifest labels are not a mapping"))?;
        for (key, value) in labels {
            label_map.insert(key.clone(), Value::String(value.clone()));
        }
    }

    if let Some(owner) = owner {
        let refs = serde_json::to_value(vec![owner.clone()])
            .map_err(|e| Error::serialization(format!("owner reference: {}", e)))?;
        metadata.insert("ownerReferences".to_string(), refs);
    }

    Ok(())
}
