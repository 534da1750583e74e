//! Owner-reference computation
//!
//! Every object this capability applies is anchored to the platform owner
//! object so cluster garbage collection cleans up when the owner goes away.
//! The ownership model itself is injected: any typed resource works.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::{Error, Result};

/// Compute an owner reference from a typed resource
///
/// Fails with a configuration error if the object has not been persisted
/// yet (no UID) or carries no name, since such a reference would be
/// rejected by the API server.
pub fn as_owner_ref<K>(owner: &K) -> Result<OwnerReference>
where
    K: Resource<DynamicType = ()>,
{
    let meta = owner.meta();
    let name = meta
        .name
        .clone()
        .ok_or_else(|| Error::configuration("owner object has no name"))?;
    let uid = meta.uid.clone().ok_or_else(|| {
        Error::configuration(format!("owner object {} has no UID; was it persisted?", name))
    })?;

    Ok(OwnerReference {
        api_version: K::api_version(&()).into_owned(),
        kind: K::kind(&()).into_owned(),
        name,
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
