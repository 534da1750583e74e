//! Small Kubernetes helpers shared across the crate
//!
//! Manifest apiVersion parsing, condition checks, and bounded polling.

use std::future::Future;
use std::time::Duration;

use kube::discovery::ApiResource;
use tracing::trace;

use crate::Error;

/// The "Ready" condition type
pub const CONDITION_READY: &str = "Ready";

/// The "True" status value for conditions
pub const STATUS_TRUE: &str = "True";

/// Default polling interval for wait operations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Parse apiVersion into (group, version)
///
/// # Examples
/// ```
/// use platform_routing::k8s::parse_api_version;
///
/// let (group, version) = parse_api_version("maistra.io/v1");
/// assert_eq!(group, "maistra.io");
/// assert_eq!(version, "v1");
///
/// let (group, version) = parse_api_version("v1");
/// assert_eq!(group, "");
/// assert_eq!(version, "v1");
/// ```
pub fn parse_api_version(api_version: &str) -> (String, String) {
    match api_version.split_once('/') {
        Some((group, version)) => (group.to_string(), version.to_string()),
        None => (String::new(), api_version.to_string()),
    }
}

/// Build an ApiResource from a known apiVersion and kind.
///
/// The version you provide is used exactly; rendered manifests carry an
/// explicit apiVersion, so no API discovery round-trip is needed.
pub fn build_api_resource(api_version: &str, kind: &str) -> ApiResource {
    let (group, version) = parse_api_version(api_version);
    ApiResource {
        group,
        version,
        kind: kind.to_string(),
        api_version: api_version.to_string(),
        plural: pluralize_kind(kind),
    }
}

/// Pluralize a Kubernetes resource kind
///
/// Simple pluralization rules; sufficient for the kinds this capability
/// applies (Service, Role, Deployment, Gateway, NetworkPolicy,
/// ServiceMeshMember, ...).
pub fn pluralize_kind(kind: &str) -> String {
    let lower = kind.to_lowercase();
    if lower.ends_with('s') || lower.ends_with("ch") || lower.ends_with("sh") {
        format!("{}es", lower)
    } else if lower.ends_with('y') && !lower.ends_with("ay") && !lower.ends_with("ey") {
        format!("{}ies", &lower[..lower.len() - 1])
    } else {
        format!("{}s", lower)
    }
}

/// Trait for types that have condition-like fields (type and status)
pub trait HasConditionFields {
    /// Get the condition type field value
    fn type_field(&self) -> &str;
    /// Get the condition status field value
    fn status_field(&self) -> &str;
}

impl HasConditionFields for k8s_openapi::api::core::v1::PodCondition {
    fn type_field(&self) -> &str {
        &self.type_
    }
    fn status_field(&self) -> &str {
        &self.status
    }
}

/// Check if a condition of the given type has status "True"
pub fn has_condition<T>(conditions: Option<&[T]>, condition_type: &str) -> bool
where
    T: HasConditionFields,
{
    conditions
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_field() == condition_type && c.status_field() == STATUS_TRUE)
        })
        .unwrap_or(false)
}

/// Check if a JSON conditions array (from a dynamic object's status) has a
/// condition of the given type with status "True"
pub fn has_json_condition(status: Option<&serde_json::Value>, condition_type: &str) -> bool {
    status
        .and_then(|s| s.get("conditions"))
        .and_then(|c| c.as_array())
        .map(|conds| {
            conds.iter().any(|c| {
                c.get("type").and_then(|t| t.as_str()) == Some(condition_type)
                    && c.get("status").and_then(|s| s.as_str()) == Some(STATUS_TRUE)
            })
        })
        .unwrap_or(false)
}

/// Poll until a condition is met or the timeout is reached
///
/// Repeatedly calls `check_fn` until it returns `Ok(true)` or `timeout`
/// elapses. Check errors are treated as "not yet" and retried; persistent
/// failure surfaces as the timeout error. Cancellation follows the async
/// model: dropping the returned future stops the poll.
pub async fn poll_until<F, Fut>(
    timeout: Duration,
    poll_interval: Duration,
    timeout_msg: impl Into<String>,
    mut check_fn: F,
) -> crate::Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<bool>>,
{
    let start = tokio::time::Instant::now();
    let timeout_msg = timeout_msg.into();
    let mut last_error: Option<Error> = None;

    loop {
        if start.elapsed() > timeout {
            let detail = match last_error {
                Some(e) => format!("{} (last error: {})", timeout_msg, e),
                None => timeout_msg,
            };
            return Err(Error::internal_with_context("poll_until", detail));
        }

        match check_fn().await {
            Ok(true) => return Ok(()),
            Ok(false) => {
                trace!("polling condition not yet met, retrying");
            }
            Err(e) => {
                trace!("polling check returned error (retrying): {}", e);
                last_error = Some(e);
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodCondition;

    #[test]
    fn test_pluralize_kind() {
        assert_eq!(pluralize_kind("Service"), "services");
        assert_eq!(pluralize_kind("NetworkPolicy"), "networkpolicies");
        assert_eq!(pluralize_kind("Gateway"), "gateways");
        assert_eq!(pluralize_kind("ServiceMeshMember"), "servicemeshmembers");
        assert_eq!(pluralize_kind("Ingress"), "ingresses");
    }

    #[test]
    fn test_build_api_resource_core_group() {
        let ar = build_api_resource("v1", "Service");
        assert_eq!(ar.group, "");
        assert_eq!(ar.version, "v1");
        assert_eq!(ar.plural, "services");
    }

    #[test]
    fn test_build_api_resource_custom_group() {
        let ar = build_api_resource("maistra.io/v1", "ServiceMeshMember");
        assert_eq!(ar.group, "maistra.io");
        assert_eq!(ar.api_version, "maistra.io/v1");
        assert_eq!(ar.plural, "servicemeshmembers");
    }

    fn condition(type_: &str, status: &str) -> PodCondition {
        PodCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_has_condition() {
        let conds = vec![condition("Initialized", "True"), condition("Ready", "True")];
        assert!(has_condition(Some(conds.as_slice()), CONDITION_READY));

        let conds = vec![condition("Ready", "False")];
        assert!(!has_condition(Some(conds.as_slice()), CONDITION_READY));

        assert!(!has_condition::<PodCondition>(None, CONDITION_READY));
    }

    #[test]
    fn test_has_json_condition() {
        let status = serde_json::json!({
            "conditions": [
                { "type": "Reconciled", "status": "True" },
                { "type": "Ready", "status": "True" }
            ]
        });
        assert!(has_json_condition(Some(&status), CONDITION_READY));

        let status = serde_json::json!({ "conditions": [{ "type": "Ready", "status": "False" }] });
        assert!(!has_json_condition(Some(&status), CONDITION_READY));
        assert!(!has_json_condition(None, CONDITION_READY));
    }

    #[tokio::test]
    async fn test_poll_until_succeeds_after_retries() {
        let mut calls = 0;
        let result = poll_until(
            Duration::from_secs(5),
            Duration::from_millis(1),
            "never",
            || {
                calls += 1;
                let done = calls >= 3;
                async move { Ok(done) }
            },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out_with_last_error() {
        let result = poll_until(
            Duration::from_millis(5),
            Duration::from_millis(1),
            "timeout waiting for readiness",
            || async { Err(Error::configuration("api unreachable")) },
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.to_string().contains("timeout waiting for readiness"));
        assert!(err.to_string().contains("api unreachable"));
    }
}
