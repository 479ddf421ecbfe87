//! Creating, patching and triggering images against the cluster.

use std::time::SystemTime;

use kube::{Resource, ResourceExt};
use snafu::{OptionExt as _, Snafu};

use crate::{
    client::{self, ResourceClient},
    crd::{Build, Image, build},
    image::{
        ImageDescriptor,
        factory::{self, ImageFactory},
    },
    save::{self, Outcome, apply_patch, send_patch},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Factory { source: factory::Error },

    #[snafu(transparent)]
    Save { source: save::Error },

    #[snafu(transparent)]
    Client { source: client::Error },

    #[snafu(display("Image {name:?} has no builds to trigger"))]
    NoBuilds { name: String },
}

/// Creates the image if it does not exist yet, and patches it otherwise.
pub async fn save_image<C>(
    client: &C,
    factory: &ImageFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &ImageDescriptor,
    conflict_check: bool,
) -> Result<Outcome<Image>, Error>
where
    C: ResourceClient<Image> + ?Sized,
{
    match client.get_opt(name, namespace).await? {
        Some(existing) => update(client, factory, &existing, descriptor, conflict_check).await,
        None => create_image(client, factory, name, namespace, descriptor).await,
    }
}

/// Creates a new image. Fails if an image with that name already exists.
pub async fn create_image<C>(
    client: &C,
    factory: &ImageFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &ImageDescriptor,
) -> Result<Outcome<Image>, Error>
where
    C: ResourceClient<Image> + ?Sized,
{
    let image = factory.make_image(name, namespace, descriptor).await?;
    let created = client.create(&image).await?;
    tracing::info!(name, namespace, "created image");

    Ok(Outcome::Created(created))
}

/// Patches an existing image. Fails if there is no image with that name.
pub async fn patch_image<C>(
    client: &C,
    factory: &ImageFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &ImageDescriptor,
    conflict_check: bool,
) -> Result<Outcome<Image>, Error>
where
    C: ResourceClient<Image> + ?Sized,
{
    let existing = client.get(name, namespace).await?;
    update(client, factory, &existing, descriptor, conflict_check).await
}

async fn update<C>(
    client: &C,
    factory: &ImageFactory<'_>,
    existing: &Image,
    descriptor: &ImageDescriptor,
    conflict_check: bool,
) -> Result<Outcome<Image>, Error>
where
    C: ResourceClient<Image> + ?Sized,
{
    let (updated, patch) = factory.make_patch(existing, descriptor).await?;
    Ok(send_patch(client, existing, updated, patch, conflict_check).await?)
}

/// Makes the cluster match `desired`, which usually comes from a YAML file.
///
/// An existing image gets the spec of `desired`, its labels and annotations are added to the
/// existing ones. `namespace` is used when `desired` does not name one.
pub async fn apply_image<C>(
    client: &C,
    mut desired: Image,
    namespace: &str,
    conflict_check: bool,
) -> Result<Outcome<Image>, Error>
where
    C: ResourceClient<Image> + ?Sized,
{
    let namespace = desired
        .namespace()
        .unwrap_or_else(|| namespace.to_owned());
    let name = desired.name_any();

    let Some(existing) = client.get_opt(&name, &namespace).await? else {
        desired.meta_mut().namespace = Some(namespace);
        desired.meta_mut().resource_version = None;
        let created = client.create(&desired).await?;
        return Ok(Outcome::Created(created));
    };

    let mut updated = existing.clone();
    updated.spec = desired.spec;
    updated.labels_mut().extend(desired.metadata.labels.unwrap_or_default());
    updated
        .annotations_mut()
        .extend(desired.metadata.annotations.unwrap_or_default());

    Ok(apply_patch(client, &existing, updated, conflict_check).await?)
}

/// Asks kpack to build the image again, by annotating its latest build with `requested_at`.
///
/// Returns [`Outcome::Unchanged`] if the build already carries that exact request.
pub async fn trigger_image<C>(
    client: &C,
    name: &str,
    namespace: &str,
    requested_at: SystemTime,
    conflict_check: bool,
) -> Result<Outcome<Build>, Error>
where
    C: ResourceClient<Build> + ?Sized,
{
    let selector = format!("{}={name}", build::IMAGE_LABEL);
    let mut builds = client.list(namespace, Some(&selector)).await?;
    build::sort_by_build_number(&mut builds);

    let latest = builds.pop().context(NoBuildsSnafu { name })?;
    let mut triggered = latest.clone();
    triggered.annotations_mut().insert(
        build::ADDITIONAL_BUILD_NEEDED_ANNOTATION.to_owned(),
        humantime::format_rfc3339_nanos(requested_at).to_string(),
    );

    let outcome = apply_patch(client, &latest, triggered, conflict_check).await?;
    if outcome.is_changed() {
        tracing::info!(
            image = name,
            build = %outcome.resource().name_any(),
            "triggered image build"
        );
    }

    Ok(outcome)
}
