//! Sending the difference between two versions of a resource.

use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::{
    client::{self, ResourceClient, Scoped},
    patch::{self, Patch},
};

/// JSON Pointer to the field that is tested before a patch is applied.
pub const RESOURCE_VERSION_PATH: &str = "/metadata/resourceVersion";

/// What happened to a resource that was saved.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<K> {
    Created(K),
    Patched(K),
    /// The desired state matched the existing resource, nothing was sent.
    Unchanged(K),
}

impl<K> Outcome<K> {
    pub fn resource(&self) -> &K {
        match self {
            Self::Created(resource)
            | Self::Patched(resource)
            | Self::Unchanged(resource) => resource,
        }
    }

    pub fn into_resource(self) -> K {
        match self {
            Self::Created(resource)
            | Self::Patched(resource)
            | Self::Unchanged(resource) => resource,
        }
    }

    pub fn is_changed(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to compute patch"))]
    ComputePatch { source: patch::Error },

    #[snafu(transparent)]
    Client { source: client::Error },
}

/// Adds a `test` operation on the resource version of `original`, so that the API server rejects
/// the patch if the resource changed after it was read.
pub fn guard_patch<K: Scoped>(original: &K, patch: Patch) -> Patch {
    match original.resource_version() {
        Some(version) => patch.with_precondition(RESOURCE_VERSION_PATH, version),
        None => patch,
    }
}

/// Patches `original` into `updated`, unless they are the same.
pub async fn apply_patch<K, C>(
    client: &C,
    original: &K,
    updated: K,
    conflict_check: bool,
) -> Result<Outcome<K>, Error>
where
    K: Scoped,
    C: ResourceClient<K> + ?Sized,
{
    let patch = patch::diff_resources(original, &updated).context(ComputePatchSnafu)?;
    send_patch(client, original, updated, patch, conflict_check).await
}

/// Sends an already computed `patch` for `original`. An empty patch is not sent.
pub async fn send_patch<K, C>(
    client: &C,
    original: &K,
    updated: K,
    patch: Patch,
    conflict_check: bool,
) -> Result<Outcome<K>, Error>
where
    K: Scoped,
    C: ResourceClient<K> + ?Sized,
{
    if patch.is_empty() {
        tracing::info!(
            kind = %K::kind_name(),
            name = %original.name_any(),
            "nothing to patch"
        );
        return Ok(Outcome::Unchanged(updated));
    }

    let patch = if conflict_check {
        guard_patch(original, patch)
    } else {
        patch
    };

    let patched = client.patch(original, &patch).await?;
    tracing::info!(
        kind = %K::kind_name(),
        name = %patched.name_any(),
        operations = patch.len(),
        "patched resource"
    );

    Ok(Outcome::Patched(patched))
}
