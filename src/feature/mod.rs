//! Declarative feature descriptors and their execution state machine
//!
//! A feature is a named unit of cluster configuration: manifest sources, a
//! data context, an enablement predicate, an owner, and ordered lists of
//! preconditions and postconditions. Features are built fresh on every
//! reconciliation and executed by a [`handler::FeaturesHandler`].

pub mod conditions;
pub mod handler;

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use serde_json::Value;
use tracing::debug;

use crate::cluster::ClusterClient;
use crate::manifest::{decorate, ManifestSource};
use crate::template::TemplateEngine;
use crate::{Error, Result, LABEL_MANAGED};

/// A gating check run before or after manifest application
///
/// `Ok(false)` and `Err` both block the feature; they differ only in the
/// message surfaced. Checks that wait for external readiness own their
/// polling and timeout.
#[async_trait]
pub trait Check: Send + Sync {
    /// Stable name identifying this check in errors and logs
    fn name(&self) -> &str;

    /// Evaluate the check against the cluster
    async fn evaluate(&self, client: &dyn ClusterClient) -> Result<bool>;
}

/// Terminal and intermediate states of a feature within one pipeline run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureState {
    /// Not yet evaluated
    Pending,
    /// Enablement predicate returned false; nothing rendered or applied
    Skipped,
    /// Manifests applied and postconditions satisfied
    Applied,
    /// A gate blocked or an apply failed; pipeline stops here
    Failed,
}

/// A named, declaratively described unit of cluster configuration
pub struct Feature {
    name: String,
    manifests: Vec<ManifestSource>,
    data: Value,
    enabled_when: Box<dyn Fn() -> bool + Send + Sync>,
    preconditions: Vec<Box<dyn Check>>,
    postconditions: Vec<Box<dyn Check>>,
    owner: Option<OwnerReference>,
    managed: bool,
}

impl Feature {
    /// Start defining a feature with the given name
    pub fn define(name: impl Into<String>) -> FeatureBuilder {
        FeatureBuilder {
            feature: Feature {
                name: name.into(),
                manifests: Vec::new(),
                data: Value::Null,
                enabled_when: Box::new(|| true),
                preconditions: Vec::new(),
                postconditions: Vec::new(),
                owner: None,
                managed: false,
            },
        }
    }

    /// The feature's name (unique within a pipeline)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run this feature through its state machine
    ///
    /// Returns the terminal state on success (`Skipped` or `Applied`); a
    /// blocked gate or failed apply returns the corresponding error and
    /// the handler records the feature as `Failed`.
    pub(crate) async fn apply(
        &self,
        client: &dyn ClusterClient,
        engine: &TemplateEngine,
        provenance_labels: &BTreeMap<String, String>,
    ) -> Result<FeatureState> {
        if !(self.enabled_when)() {
            debug!(feature = %self.name, "enablement predicate false, skipping");
            return Ok(FeatureState::Skipped);
        }

        for check in &self.preconditions {
            match check.evaluate(client).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(Error::precondition(&self.name, check.name(), "not satisfied"))
                }
                Err(e) => {
                    return Err(Error::precondition(&self.name, check.name(), e.to_string()))
                }
            }
        }

        let mut labels = provenance_labels.clone();
        if self.managed {
            labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
        }

        // Render the whole batch before applying any of it, so a template
        // error cannot leave a half-applied feature behind.
        let mut rendered = Vec::with_capacity(self.manifests.len());
        for source in &self.manifests {
            let mut manifest = source.render(engine, &self.data).map_err(|e| {
                Error::manifest_application(&self.name, format!("{}: {}", source.name, e))
            })?;
            decorate(&mut manifest, self.owner.as_ref(), &labels)
                .map_err(|e| Error::manifest_application(&self.name, e.to_string()))?;
            rendered.push(manifest);
        }

        for manifest in &rendered {
            client
                .apply(manifest)
                .await
                .map_err(|e| Error::manifest_application(&self.name, e.to_string()))?;
        }

        for check in &self.postconditions {
            match check.evaluate(client).await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(Error::postcondition(&self.name, check.name(), "not satisfied"))
                }
                Err(e) => {
                    return Err(Error::postcondition(&self.name, check.name(), e.to_string()))
                }
            }
        }

        Ok(FeatureState::Applied)
    }
}

/// Fluent builder for [`Feature`]
pub struct FeatureBuilder {
    feature: Feature,
}

impl FeatureBuilder {
    /// Set the ordered manifest sources applied as one batch
    pub fn manifests(mut self, sources: impl IntoIterator<Item = ManifestSource>) -> Self {
        self.feature.manifests = sources.into_iter().collect();
        self
    }

    /// Set the data context handed to manifest rendering
    pub fn with_data(mut self, data: Value) -> Self {
        self.feature.data = data;
        self
    }

    /// Set the enablement predicate, re-evaluated at apply time
    pub fn enabled_when(mut self, predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.feature.enabled_when = Box::new(predicate);
        self
    }

    /// Attach an owner reference to every applied manifest
    pub fn owned_by(mut self, owner: OwnerReference) -> Self {
        self.feature.owner = Some(owner);
        self
    }

    /// Mark applied objects as managed (tracked for later pruning)
    pub fn managed(mut self) -> Self {
        self.feature.managed = true;
        self
    }

    /// Append a precondition, run before manifest application
    pub fn pre_condition(mut self, check: impl Check + 'static) -> Self {
        self.feature.preconditions.push(Box::new(check));
        self
    }

    /// Append a postcondition, run after manifest application
    pub fn post_condition(mut self, check: impl Check + 'static) -> Self {
        self.feature.postconditions.push(Box::new(check));
        self
    }

    /// Finish the definition
    pub fn build(self) -> Feature {
        self.feature
    }
}
