use std::path::PathBuf;

use k8s_openapi::api::core::v1::Secret;
use kpack_client::{
    client::{self, ResourceClient as _},
    secret::{self, create_secret, delete_secret, is_managed, make_secret, secret_target},
};
use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::{
    cli::{SecretCommand, SecretCreateArgs},
    commands::Context,
    output::{self, Table},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read git ssh key from {path:?}"))]
    ReadSshKey {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(transparent)]
    Secret { source: secret::Error },

    #[snafu(transparent)]
    Client { source: client::Error },

    #[snafu(transparent)]
    Output { source: output::Error },
}

pub async fn run(context: &Context, command: SecretCommand) -> Result<(), Error> {
    match command {
        SecretCommand::Create(args) => create(context, &args).await,
        SecretCommand::List => {
            let secrets: Vec<Secret> = context.client.list(context.namespace(), None).await?;
            let table = secret_table(&secrets);
            if table.is_empty() {
                println!("{}", output::nothing_found("secret"));
            } else {
                print!("{}", table.render()?);
            }
            Ok(())
        }
        SecretCommand::Delete {
            name,
            service_account,
        } => {
            let service_account =
                service_account.unwrap_or_else(|| context.defaults.service_account.clone());
            delete_secret(
                &context.client,
                &context.client,
                &name,
                context.namespace(),
                &service_account,
                context.conflict_check,
            )
            .await?;
            println!("{name:?} deleted");
            Ok(())
        }
    }
}

async fn create(context: &Context, args: &SecretCreateArgs) -> Result<(), Error> {
    let git_ssh_key = match &args.git_ssh_key {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .context(ReadSshKeySnafu { path })?,
        ),
        None => None,
    };
    let kind = args.descriptor(git_ssh_key).kind()?;
    let secret = make_secret(&args.name, context.namespace(), &kind, |variable| {
        std::env::var(variable).ok()
    })?;

    let service_account = args
        .service_account
        .as_deref()
        .unwrap_or(&context.defaults.service_account);
    create_secret(
        &context.client,
        &context.client,
        &secret,
        kind.is_registry(),
        service_account,
        context.conflict_check,
    )
    .await?;

    println!("{:?} created", args.name);
    Ok(())
}

/// Lists the secrets holding registry or git credentials, skipping all others.
fn secret_table(secrets: &[Secret]) -> Table {
    let mut table = Table::new(["NAME", "TARGET"]);
    for secret in secrets.iter().filter(|secret| is_managed(secret)) {
        table.push_row(vec![
            secret.name_any(),
            secret_target(secret).unwrap_or_default(),
        ]);
    }
    table
}
