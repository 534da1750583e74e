//! Platform routing capability for service-mesh ingress
//!
//! Components enroll cluster resources that should be reachable through the
//! platform's ingress gateway; the platform reconciles that demand into mesh
//! membership, gateway workloads, and watch RBAC. Registration is in-memory
//! and append-only; every reconciliation re-derives the desired cluster state
//! from the current registration set and converges it idempotently.

#![deny(missing_docs)]

pub mod capability;
pub mod cluster;
pub mod config;
pub mod error;
pub mod feature;
pub mod k8s;
pub mod manifest;
pub mod owner;
pub mod rbac;
pub mod target;
pub mod template;

pub use capability::RoutingCapability;
pub use config::{IngressConfig, IngressGatewaySpec, RoutingSpec};
pub use error::Error;
pub use target::{ResourceReference, RoutingTarget};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Role granting the platform watch access over enrolled routing resources
pub const ROUTING_RESOURCES_WATCHER_ROLE: &str = "platform-routing-resources-watcher";

/// ServiceAccount the routing watcher role is bound to
pub const ROUTING_CONTROLLER_SERVICE_ACCOUNT: &str = "platform-routing-controller";

/// Field manager used for all server-side-apply writes
pub const FIELD_MANAGER: &str = "platform-routing";

/// CRD whose presence indicates the service-mesh operator is installed
pub const SERVICE_MESH_CONTROL_PLANE_CRD: &str = "servicemeshcontrolplanes.maistra.io";

/// API version of the mesh membership object
pub const SERVICE_MESH_MEMBER_API_VERSION: &str = "maistra.io/v1";

/// Kind of the mesh membership object
pub const SERVICE_MESH_MEMBER_KIND: &str = "ServiceMeshMember";

/// Name the mesh operator requires for membership objects
pub const SERVICE_MESH_MEMBER_NAME: &str = "default";

/// Label marking objects as managed (tracked for later pruning)
pub const LABEL_MANAGED: &str = "platform.dev/managed";

/// Label carrying the provenance source type of an applied object
pub const LABEL_SOURCE_TYPE: &str = "platform.dev/source-type";

/// Label carrying the provenance source name of an applied object
pub const LABEL_SOURCE_NAME: &str = "platform.dev/source-name";
