//! Error types for the routing capability
//!
//! Errors are structured with fields to aid debugging in production.
//! Each variant carries the stage that failed (which feature, which
//! precondition or postcondition) so the caller can log it meaningfully
//! and decide whether to re-run reconciliation.

use thiserror::Error;

/// Main error type for routing capability operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid owner or static configuration; not retryable without a config fix
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what's invalid
        message: String,
    },

    /// Role or role-binding write failed; retryable, converges next cycle
    #[error("RBAC synthesis error for {role}: {message}")]
    RbacSynthesis {
        /// Name of the role being synthesized
        role: String,
        /// Description of what failed
        message: String,
    },

    /// A feature precondition blocked; retryable once the dependency is satisfied
    #[error("precondition [{check}] blocked feature {feature}: {message}")]
    Precondition {
        /// Feature whose precondition blocked
        feature: String,
        /// Name of the check that blocked
        check: String,
        /// Why the check blocked
        message: String,
    },

    /// Rendering or applying feature manifests failed; retryable
    #[error("manifest application failed for feature {feature}: {message}")]
    ManifestApplication {
        /// Feature whose manifests failed
        feature: String,
        /// Description of what failed
        message: String,
    },

    /// Manifests applied but readiness was not reached; retryable, objects left in place
    #[error("postcondition [{check}] failed for feature {feature}: {message}")]
    Postcondition {
        /// Feature whose postcondition failed
        feature: String,
        /// Name of the check that failed
        check: String,
        /// Why readiness was not reached
        message: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// Internal/operational error (e.g. a readiness wait timing out)
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g. "poll_until")
        context: String,
    },
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an RBAC synthesis error for a role
    pub fn rbac_synthesis(role: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::RbacSynthesis {
            role: role.into(),
            message: msg.into(),
        }
    }

    /// Create a precondition error identifying the blocking check
    pub fn precondition(
        feature: impl Into<String>,
        check: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Precondition {
            feature: feature.into(),
            check: check.into(),
            message: msg.into(),
        }
    }

    /// Create a manifest application error for a feature
    pub fn manifest_application(feature: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ManifestApplication {
            feature: feature.into(),
            message: msg.into(),
        }
    }

    /// Create a postcondition error identifying the failed check
    pub fn postcondition(
        feature: impl Into<String>,
        check: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Postcondition {
            feature: feature.into(),
            check: check.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Configuration and serialization errors require human intervention.
    /// Everything else is expected to converge on a later reconcile call.
    /// Kubernetes errors depend on the status code.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => {
                // Retry on transient K8s errors (connection, timeout)
                // Don't retry on 4xx errors (validation, forbidden, etc.)
                !matches!(
                    source,
                    kube::Error::Api(ae) if (400..500).contains(&ae.code)
                )
            }
            Error::Configuration { .. } => false,
            Error::RbacSynthesis { .. } => true,
            Error::Precondition { .. } => true,
            Error::ManifestApplication { .. } => true,
            Error::Postcondition { .. } => true,
            Error::Serialization { .. } => false,
            Error::Internal { .. } => true,
        }
    }

    /// Get the feature name if this error is associated with a specific feature
    pub fn feature(&self) -> Option<&str> {
        match self {
            Error::Precondition { feature, .. } => Some(feature),
            Error::ManifestApplication { feature, .. } => Some(feature),
            Error::Postcondition { feature, .. } => Some(feature),
            _ => None,
        }
    }

    /// Get the check name if this error was raised by a pre/postcondition
    pub fn check(&self) -> Option<&str> {
        match self {
            Error::Precondition { check, .. } => Some(check),
            Error::Postcondition { check, .. } => Some(check),
            _ => None,
        }
    }
}
