use snafu::Snafu;

use crate::{
    client::{self, ResourceClient},
    custom_builder::{BuilderDescriptor, BuilderFactory, CustomBuilder, factory},
    save::{self, Outcome, send_patch},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Factory { source: factory::Error },

    #[snafu(transparent)]
    Save { source: save::Error },

    #[snafu(transparent)]
    Client { source: client::Error },
}

/// Creates the builder if it does not exist yet, and patches it otherwise.
pub async fn save_builder<B, C>(
    client: &C,
    factory: &BuilderFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &BuilderDescriptor,
    conflict_check: bool,
) -> Result<Outcome<B>, Error>
where
    B: CustomBuilder,
    C: ResourceClient<B> + ?Sized,
{
    match client.get_opt(name, namespace).await? {
        Some(existing) => update(client, factory, &existing, descriptor, conflict_check).await,
        None => create_builder(client, factory, name, namespace, descriptor).await,
    }
}

pub async fn create_builder<B, C>(
    client: &C,
    factory: &BuilderFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &BuilderDescriptor,
) -> Result<Outcome<B>, Error>
where
    B: CustomBuilder,
    C: ResourceClient<B> + ?Sized,
{
    let builder: B = factory.make_builder(name, namespace, descriptor)?;
    let created = client.create(&builder).await?;
    tracing::info!(kind = %B::kind_name(), name, "created builder");

    Ok(Outcome::Created(created))
}

pub async fn patch_builder<B, C>(
    client: &C,
    factory: &BuilderFactory<'_>,
    name: &str,
    namespace: &str,
    descriptor: &BuilderDescriptor,
    conflict_check: bool,
) -> Result<Outcome<B>, Error>
where
    B: CustomBuilder,
    C: ResourceClient<B> + ?Sized,
{
    let existing = client.get(name, namespace).await?;
    update(client, factory, &existing, descriptor, conflict_check).await
}

async fn update<B, C>(
    client: &C,
    factory: &BuilderFactory<'_>,
    existing: &B,
    descriptor: &BuilderDescriptor,
    conflict_check: bool,
) -> Result<Outcome<B>, Error>
where
    B: CustomBuilder,
    C: ResourceClient<B> + ?Sized,
{
    let (updated, patch) = factory.make_patch(existing, descriptor)?;
    Ok(send_patch(client, existing, updated, patch, conflict_check).await?)
}
