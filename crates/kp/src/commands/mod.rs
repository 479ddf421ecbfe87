use std::time::Duration;

use kpack_client::{
    client::{self, Client, Scoped},
    config::Defaults,
    crd::{Builder, ClusterBuilder, Conditions},
    save::Outcome,
    wait,
};
use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::cli::{Command, Opts};

mod build;
mod builder;
mod image;
mod secret;
mod stack;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to connect to Kubernetes"))]
    Connect { source: client::Error },

    #[snafu(transparent)]
    Image { source: image::Error },

    #[snafu(transparent)]
    Build { source: build::Error },

    #[snafu(transparent)]
    Builder { source: builder::Error },

    #[snafu(transparent)]
    Stack { source: stack::Error },

    #[snafu(transparent)]
    Secret { source: secret::Error },
}

/// Everything a command needs besides its own arguments.
pub struct Context {
    pub client: Client,
    pub defaults: Defaults,
    pub wait_timeout: Duration,
    pub conflict_check: bool,
}

impl Context {
    pub fn namespace(&self) -> &str {
        self.client.namespace()
    }

    /// Waits for the saved resource to become ready if `--wait` was given and something changed.
    pub async fn wait_if_requested<K>(
        &self,
        outcome: &Outcome<K>,
        requested: bool,
    ) -> Result<(), wait::Error>
    where
        K: Scoped + Conditions,
    {
        if requested && outcome.is_changed() {
            wait::wait_until_ready(&self.client, outcome.resource(), self.wait_timeout).await?;
        }
        Ok(())
    }
}

pub async fn run(opts: Opts) -> Result<(), Error> {
    let client = Client::new(&opts.cluster).await.context(ConnectSnafu)?;
    let context = Context {
        client,
        defaults: opts.defaults,
        wait_timeout: opts.write.wait_timeout,
        conflict_check: !opts.write.no_conflict_check,
    };

    match opts.command {
        Command::Image(command) => image::run(&context, command).await?,
        Command::Build(command) => build::run(&context, command).await?,
        Command::Builder(command) => builder::run::<Builder>(&context, command).await?,
        Command::ClusterBuilder(command) => {
            builder::run::<ClusterBuilder>(&context, command).await?;
        }
        Command::ClusterStack(command) => stack::run(&context, command).await?,
        Command::Secret(command) => secret::run(&context, command).await?,
    }

    Ok(())
}

/// The line printed after a resource was saved.
fn outcome_message<K: ResourceExt>(outcome: &Outcome<K>) -> String {
    let name = outcome.resource().name_any();
    match outcome {
        Outcome::Created(_) => format!("{name:?} created"),
        Outcome::Patched(_) => format!("{name:?} patched"),
        Outcome::Unchanged(_) => "nothing to patch".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use kpack_client::crd::{Image, ImageSpec};
    use rstest::rstest;

    use super::*;

    fn image() -> Image {
        Image::new("petclinic", ImageSpec::default())
    }

    #[rstest]
    #[case(Outcome::Created(image()), "\"petclinic\" created")]
    #[case(Outcome::Patched(image()), "\"petclinic\" patched")]
    #[case(Outcome::Unchanged(image()), "nothing to patch")]
    fn outcome_messages(#[case] outcome: Outcome<Image>, #[case] expected: &str) {
        assert_eq!(outcome_message(&outcome), expected);
    }
}
