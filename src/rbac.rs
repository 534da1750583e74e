//! Watch RBAC synthesis
//!
//! The platform needs get/list/watch access over every enrolled routing
//! resource. The role's rule set is derived from the current reference set
//! on every call and applied wholesale via server-side apply, so rules for
//! resources that are no longer registered disappear on the next cycle
//! (across process restarts the registration list is rebuilt from scratch).

use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde_json::Value;
use tracing::debug;

use crate::cluster::ClusterClient;
use crate::target::ResourceReference;
use crate::{Error, Result, ROUTING_CONTROLLER_SERVICE_ACCOUNT};

const READ_VERBS: [&str; 3] = ["get", "list", "watch"];

/// Build the watch rule set for the given references
///
/// One rule per distinct (group, resource) pair in first-seen order, with
/// resourceNames listing the referenced object names (first-seen order,
/// duplicates collapsed). The result is a function of the current
/// reference set only.
pub fn build_policy_rules(references: &[ResourceReference]) -> Vec<PolicyRule> {
    let mut rules: Vec<(String, String, Vec<String>)> = Vec::new();

    for reference in references {
        let entry = rules
            .iter_mut()
            .find(|(group, resource, _)| group == &reference.group && resource == &reference.resource);
        match entry {
            Some((_, _, names)) => {
                if !names.contains(&reference.name) {
                    names.push(reference.name.clone());
                }
            }
            None => rules.push((
                reference.group.clone(),
                reference.resource.clone(),
                vec![reference.name.clone()],
            )),
        }
    }

    rules
        .into_iter()
        .map(|(group, resource, names)| PolicyRule {
            api_groups: Some(vec![group]),
            resources: Some(vec![resource]),
            resource_names: Some(names),
            verbs: READ_VERBS.iter().map(|v| v.to_string()).collect(),
            ..Default::default()
        })
        .collect()
}

fn watcher_role(role_name: &str, references: &[ResourceReference], owner: &OwnerReference) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: Some(role_name.to_string()),
            owner_references: Some(vec![owner.clone()]),
            ..Default::default()
        },
        rules: Some(build_policy_rules(references)),
        ..Default::default()
    }
}

fn watcher_binding(role_name: &str, subject_namespace: &str, owner: &OwnerReference) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(role_name.to_string()),
            owner_references: Some(vec![owner.clone()]),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role_name.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: ROUTING_CONTROLLER_SERVICE_ACCOUNT.to_string(),
            namespace: Some(subject_namespace.to_string()),
            ..Default::default()
        }]),
    }
}

/// Serialize a typed resource into an apply-ready manifest
///
/// k8s-openapi types do not carry apiVersion/kind fields, so they are
/// injected from the type's constants.
fn to_manifest<T>(resource: &T) -> Result<Value>
where
    T: serde::Serialize + k8s_openapi::Resource,
{
    let mut value = serde_json::to_value(resource)
        .map_err(|e| Error::serialization_for_kind(T::KIND, e.to_string()))?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("apiVersion".to_string(), Value::String(T::API_VERSION.to_string()));
        obj.insert("kind".to_string(), Value::String(T::KIND.to_string()));
    }
    Ok(value)
}

/// Create or update the platform watch role and its binding
///
/// Idempotent: server-side apply replaces the rule set to exactly match
/// `references`; absent objects are created. Partial application (role
/// updated, binding failed) is reported but not rolled back; the next
/// reconciliation converges.
pub async fn create_or_update_platform_rbac(
    client: &dyn ClusterClient,
    role_name: &str,
    references: &[ResourceReference],
    subject_namespace: &str,
    owner: &OwnerReference,
) -> Result<()> {
    let role = watcher_role(role_name, references, owner);
    let binding = watcher_binding(role_name, subject_namespace, owner);

    debug!(role = %role_name, resources = references.len(), "synthesizing platform RBAC");

    let role_manifest = to_manifest(&role)?;
    client
        .apply(&role_manifest)
        .await
        .map_err(|e| Error::rbac_synthesis(role_name, format!("role apply failed: {}", e)))?;

    let binding_manifest = to_manifest(&binding)?;
    client
        .apply(&binding_manifest)
        .await
        .map_err(|e| Error::rbac_synthesis(role_name, format!("binding apply failed: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterClient;
    use mockall::predicate;

    fn reference(group: &str, resource: &str, name: &str) -> ResourceReference {
        ResourceReference::namespaced(group, resource, name, "team-a")
    }

    fn owner() -> OwnerReference {
        OwnerReference {
            api_version: "v1".to_string(),
            kind: "ConfigMap".to_string(),
            name: "platform".to_string(),
            uid: "abc-123".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rules_group_by_group_and_resource() {
        let refs = vec![
            reference("", "services", "model-a"),
            reference("serving.example.io", "models", "model-b"),
            reference("", "services", "model-c"),
        ];
        let rules = build_policy_rules(&refs);

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].api_groups, Some(vec!["".to_string()]));
        assert_eq!(rules[0].resources, Some(vec!["services".to_string()]));
        assert_eq!(
            rules[0].resource_names,
            Some(vec!["model-a".to_string(), "model-c".to_string()])
        );
        assert_eq!(rules[1].api_groups, Some(vec!["serving.example.io".to_string()]));
        assert_eq!(rules[1].resource_names, Some(vec!["model-b".to_string()]));
        for rule in &rules {
            assert_eq!(rule.verbs, vec!["get", "list", "watch"]);
        }
    }

    #[test]
    fn test_rules_collapse_duplicate_names() {
        let refs = vec![
            reference("", "services", "model-a"),
            reference("", "services", "model-a"),
        ];
        let rules = build_policy_rules(&refs);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].resource_names, Some(vec!["model-a".to_string()]));
    }

    #[test]
    fn test_rules_are_a_function_of_current_set_only() {
        // Convergence: a later call with a different set produces a rule
        // set with no trace of the earlier one.
        let first = build_policy_rules(&[reference("", "services", "old")]);
        let second = build_policy_rules(&[reference("", "services", "new")]);
        assert_eq!(first[0].resource_names, Some(vec!["old".to_string()]));
        assert_eq!(second[0].resource_names, Some(vec!["new".to_string()]));
    }

    #[test]
    fn test_empty_reference_set_yields_empty_rules() {
        assert!(build_policy_rules(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_rbac_applies_role_then_binding() {
        let mut client = MockClusterClient::new();
        let mut seq = mockall::Sequence::new();

        client
            .expect_apply()
            .once()
            .in_sequence(&mut seq)
            .withf(|m| {
                m["kind"] == "ClusterRole"
                    && m["metadata"]["name"] == "platform-routing-resources-watcher"
                    && m["rules"][0]["resourceNames"][0] == "model-a"
                    && m["metadata"]["ownerReferences"][0]["uid"] == "abc-123"
            })
            .returning(|_| Ok(()));
        client
            .expect_apply()
            .once()
            .in_sequence(&mut seq)
            .withf(|m| {
                m["kind"] == "ClusterRoleBinding"
                    && m["roleRef"]["name"] == "platform-routing-resources-watcher"
                    && m["subjects"][0]["name"] == ROUTING_CONTROLLER_SERVICE_ACCOUNT
                    && m["subjects"][0]["namespace"] == "mesh-ingress"
            })
            .returning(|_| Ok(()));

        create_or_update_platform_rbac(
            &client,
            "platform-routing-resources-watcher",
            &[reference("", "services", "model-a")],
            "mesh-ingress",
            &owner(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_binding_failure_reports_rbac_synthesis_error() {
        let mut client = MockClusterClient::new();
        let mut seq = mockall::Sequence::new();

        client
            .expect_apply()
            .once()
            .in_sequence(&mut seq)
            .withf(|m| m["kind"] == "ClusterRole")
            .returning(|_| Ok(()));
        client
            .expect_apply()
            .once()
            .in_sequence(&mut seq)
            .withf(|m| m["kind"] == "ClusterRoleBinding")
            .returning(|_| Err(Error::configuration("api rejected binding")));

        let err = create_or_update_platform_rbac(
            &client,
            "platform-routing-resources-watcher",
            &[],
            "mesh-ingress",
            &owner(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::RbacSynthesis { .. }));
        assert!(err.to_string().contains("binding apply failed"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_empty_set_still_writes_empty_rule_set() {
        let mut client = MockClusterClient::new();
        client
            .expect_apply()
            .times(2)
            .with(predicate::function(|m: &Value| {
                m["kind"] != "ClusterRole" || m["rules"].as_array().is_some_and(|r| r.is_empty())
            }))
            .returning(|_| Ok(()));

        create_or_update_platform_rbac(
            &client,
            "platform-routing-resources-watcher",
            &[],
            "mesh-ingress",
            &owner(),
        )
        .await
        .unwrap();
    }
}
