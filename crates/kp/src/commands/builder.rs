use std::path::{Path, PathBuf};

use kpack_client::{
    client::{self, ResourceClient},
    crd::OrderEntry,
    custom_builder::{self, BuilderFactory, CustomBuilder, ParseOrderError, save},
    wait,
};
use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::{
    cli::{BuilderCommand, BuilderSaveArgs},
    commands::{Context, outcome_message},
    output::{self, Table},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read order from {path:?}"))]
    ReadOrder {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse order from {path:?}"))]
    ParseOrder {
        source: ParseOrderError,
        path: PathBuf,
    },

    #[snafu(transparent)]
    Save { source: save::Error },

    #[snafu(transparent)]
    Client { source: client::Error },

    #[snafu(transparent)]
    Wait { source: wait::Error },

    #[snafu(transparent)]
    Output { source: output::Error },
}

#[derive(Clone, Copy)]
enum SaveMode {
    Create,
    Patch,
    CreateOrPatch,
}

/// Runs a builder command against namespaced builders or ClusterBuilders, depending on `B`.
pub async fn run<B: CustomBuilder>(
    context: &Context,
    command: BuilderCommand,
) -> Result<(), Error> {
    let namespace = context.namespace();
    match command {
        BuilderCommand::Create(args) => {
            save_from_args::<B>(context, &args, SaveMode::Create).await
        }
        BuilderCommand::Patch(args) => {
            save_from_args::<B>(context, &args, SaveMode::Patch).await
        }
        BuilderCommand::Save(args) => {
            save_from_args::<B>(context, &args, SaveMode::CreateOrPatch).await
        }
        BuilderCommand::Get { name } => {
            let builder: B = context.client.get(&name, namespace).await?;
            print!("{}", output::to_yaml(&B::kind_name(), &builder)?);
            Ok(())
        }
        BuilderCommand::List => {
            let builders: Vec<B> = context.client.list(namespace, None).await?;
            if builders.is_empty() {
                println!("{}", output::nothing_found(&B::kind_name().to_lowercase()));
            } else {
                print!("{}", builder_table(&builders).render()?);
            }
            Ok(())
        }
        BuilderCommand::Status { name } => {
            let builder: B = context.client.get(&name, namespace).await?;
            print!("{}", builder_details(&builder)?);
            Ok(())
        }
        BuilderCommand::Delete { name } => {
            ResourceClient::<B>::delete(&context.client, &name, namespace).await?;
            println!("{name:?} deleted");
            Ok(())
        }
    }
}

async fn save_from_args<B: CustomBuilder>(
    context: &Context,
    args: &BuilderSaveArgs,
    mode: SaveMode,
) -> Result<(), Error> {
    let mut descriptor = args.descriptor();
    if let Some(path) = &args.order {
        descriptor.order = Some(read_order(path).await?);
    }

    let factory = BuilderFactory::new(&context.defaults);
    let client = &context.client;
    let namespace = context.namespace();

    let outcome = match mode {
        SaveMode::Create => {
            save::create_builder::<B, _>(client, &factory, &args.name, namespace, &descriptor)
                .await?
        }
        SaveMode::Patch => {
            save::patch_builder::<B, _>(
                client,
                &factory,
                &args.name,
                namespace,
                &descriptor,
                context.conflict_check,
            )
            .await?
        }
        SaveMode::CreateOrPatch => {
            save::save_builder::<B, _>(
                client,
                &factory,
                &args.name,
                namespace,
                &descriptor,
                context.conflict_check,
            )
            .await?
        }
    };

    println!("{}", outcome_message(&outcome));
    context.wait_if_requested(&outcome, args.wait.wait).await?;
    Ok(())
}

async fn read_order(path: &Path) -> Result<Vec<OrderEntry>, Error> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .context(ReadOrderSnafu { path })?;
    custom_builder::parse_order(&contents).context(ParseOrderSnafu { path })
}

fn builder_table<B: CustomBuilder>(builders: &[B]) -> Table {
    let mut table = Table::new(["NAME", "READY", "STACK", "IMAGE"]);
    for builder in builders {
        table.push_row(vec![
            builder.name_any(),
            builder.ready_status().to_string(),
            builder.stack_id().unwrap_or_default().to_owned(),
            builder.latest_image().unwrap_or_default().to_owned(),
        ]);
    }
    table
}

fn builder_details<B: CustomBuilder>(builder: &B) -> Result<String, output::Error> {
    let template = builder.template();
    let mut rendered = output::details([
        ("Status", builder.ready_status().to_string()),
        ("Message", builder.ready_message().to_owned()),
        (
            "Image",
            builder.latest_image().unwrap_or_default().to_owned(),
        ),
        ("Stack", builder.stack_id().unwrap_or_default().to_owned()),
        (
            "Run Image",
            builder
                .builder_status()
                .and_then(|status| status.stack.as_ref())
                .and_then(|stack| stack.run_image.clone())
                .unwrap_or_default(),
        ),
        ("Tag", template.tag.clone()),
    ])?;

    let buildpacks = builder
        .builder_status()
        .map(|status| status.builder_metadata.as_slice())
        .unwrap_or_default();
    if !buildpacks.is_empty() {
        let mut table = Table::new(["BUILDPACK ID", "VERSION", "HOMEPAGE"]);
        for buildpack in buildpacks {
            table.push_row(vec![
                buildpack.id.clone(),
                buildpack.version.clone(),
                buildpack.homepage.clone().unwrap_or_default(),
            ]);
        }
        rendered.push('\n');
        rendered.push_str(&table.render()?);
    }

    Ok(rendered)
}
