//! Ordered, fail-fast feature pipeline
//!
//! A handler is constructed fresh on every reconciliation from the
//! capability's current state and discarded after `apply` returns; there
//! is no cross-call state.

use std::collections::BTreeMap;

use tracing::{info, instrument, warn};

use crate::cluster::ClusterClient;
use crate::feature::{Feature, FeatureState};
use crate::template::TemplateEngine;
use crate::{Result, LABEL_SOURCE_NAME, LABEL_SOURCE_TYPE};

/// What kind of platform construct contributed a feature set
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// An optional platform capability
    PlatformCapability,
}

impl SourceKind {
    /// Label value for this source kind
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceKind::PlatformCapability => "platform-capability",
        }
    }
}

/// Provenance tag for a feature set, used for labeling and auditing only
#[derive(Clone, Debug)]
pub struct Source {
    /// Kind of the contributing construct
    pub kind: SourceKind,
    /// Name of the contributing construct
    pub name: String,
}

impl Source {
    /// Tag a feature set as contributed by a platform capability
    pub fn platform_capability(name: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::PlatformCapability,
            name: name.into(),
        }
    }
}

/// Terminal state of one feature within a completed pipeline run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureReport {
    /// Feature name
    pub name: String,
    /// Terminal state reached
    pub state: FeatureState,
}

/// An ordered list of features scoped to a namespace
pub struct FeaturesHandler {
    namespace: String,
    source: Source,
    features: Vec<Feature>,
}

impl FeaturesHandler {
    /// Create a handler over the given features
    pub fn new(namespace: impl Into<String>, source: Source, features: Vec<Feature>) -> Self {
        Self {
            namespace: namespace.into(),
            source,
            features,
        }
    }

    /// Apply all features strictly in declaration order
    ///
    /// Stops at the first failed feature and returns its error; later
    /// features depend on earlier ones, so nothing past a failure is
    /// evaluated. On success, returns the terminal state of every feature.
    #[instrument(skip_all, fields(namespace = %self.namespace, source = %self.source.name))]
    pub async fn apply(&self, client: &dyn ClusterClient) -> Result<Vec<FeatureReport>> {
        let engine = TemplateEngine::new();
        let labels = BTreeMap::from([
            (
                LABEL_SOURCE_TYPE.to_string(),
                self.source.kind.as_label().to_string(),
            ),
            (LABEL_SOURCE_NAME.to_string(), self.source.name.clone()),
        ]);

        let mut reports = Vec::with_capacity(self.features.len());
        for feature in &self.features {
            match feature.apply(client, &engine, &labels).await {
                Ok(state) => {
                    info!(feature = %feature.name(), state = ?state, "feature evaluated");
                    reports.push(FeatureReport {
                        name: feature.name().to_string(),
                        state,
                    });
                }
                Err(e) => {
                    warn!(
                        feature = %feature.name(),
                        state = ?FeatureState::Failed,
                        error = %e,
                        "feature failed, stopping pipeline"
                    );
                    return Err(e);
                }
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::MockClusterClient;
    use crate::error::Error;
    use crate::feature::Check;
    use crate::manifest::ManifestSource;
    use async_trait::async_trait;
    use serde_json::json;

    const CM_TEMPLATE: ManifestSource = ManifestSource::new(
        "test/configmap.yaml",
        "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ${name}\n  namespace: test-ns\n",
    );

    struct Block(&'static str);

    #[async_trait]
    impl Check for Block {
        fn name(&self) -> &str {
            self.0
        }
        async fn evaluate(&self, _client: &dyn ClusterClient) -> Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_pipeline_stops_at_first_failed_feature() {
        // Feature 1 applies but its postcondition blocks; feature 2's
        // manifest must never reach the cluster.
        let mut client = MockClusterClient::new();
        client
            .expect_apply()
            .once()
            .withf(|m| m["metadata"]["name"] == "first")
            .returning(|_| Ok(()));

        let features = vec![
            Feature::define("first")
                .manifests([CM_TEMPLATE])
                .with_data(json!({ "name": "first" }))
                .post_condition(Block("readiness"))
                .build(),
            Feature::define("second")
                .manifests([CM_TEMPLATE])
                .with_data(json!({ "name": "second" }))
                .build(),
        ];

        let handler =
            FeaturesHandler::new("test-ns", Source::platform_capability("routing"), features);
        let err = handler.apply(&client).await.unwrap_err();
        assert_eq!(err.feature(), Some("first"));
        assert!(matches!(err, Error::Postcondition { .. }));
    }

    #[tokio::test]
    async fn test_pipeline_reports_states_in_order() {
        let mut client = MockClusterClient::new();
        client
            .expect_apply()
            .once()
            .withf(|m| {
                m["metadata"]["name"] == "applied"
                    && m["metadata"]["labels"][LABEL_SOURCE_TYPE] == "platform-capability"
                    && m["metadata"]["labels"][LABEL_SOURCE_NAME] == "routing"
            })
            .returning(|_| Ok(()));

        let features = vec![
            Feature::define("skipped")
                .manifests([CM_TEMPLATE])
                .with_data(json!({ "name": "skipped" }))
                .enabled_when(|| false)
                .build(),
            Feature::define("applied")
                .manifests([CM_TEMPLATE])
                .with_data(json!({ "name": "applied" }))
                .build(),
        ];

        let handler =
            FeaturesHandler::new("test-ns", Source::platform_capability("routing"), features);
        let reports = handler.apply(&client).await.unwrap();
        assert_eq!(
            reports,
            vec![
                FeatureReport {
                    name: "skipped".to_string(),
                    state: FeatureState::Skipped,
                },
                FeatureReport {
                    name: "applied".to_string(),
                    state: FeatureState::Applied,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_a_noop() {
        let client = MockClusterClient::new();
        let handler =
            FeaturesHandler::new("test-ns", Source::platform_capability("routing"), vec![]);
        assert!(handler.apply(&client).await.unwrap().is_empty());
    }
}
