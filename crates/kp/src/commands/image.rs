use std::{
    path::{Path, PathBuf},
    time::SystemTime,
};

use kpack_client::{
    client::{self, ResourceClient},
    crd::{Conditions, Image},
    image::{ImageFactory, save},
    upload::UnavailableUploader,
    wait,
};
use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::{
    cli::{ImageCommand, ImageSaveArgs},
    commands::{Context, outcome_message},
    output::{self, Table},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read image from {path:?}"))]
    ReadFile {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse image from {path:?}"))]
    ParseFile {
        source: serde_yaml::Error,
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

pub async fn run(context: &Context, command: ImageCommand) -> Result<(), Error> {
    match command {
        ImageCommand::Create(args) => save_from_args(context, &args, SaveMode::Create).await,
        ImageCommand::Patch(args) => save_from_args(context, &args, SaveMode::Patch).await,
        ImageCommand::Save(args) => {
            save_from_args(context, &args, SaveMode::CreateOrPatch).await
        }
        ImageCommand::Apply { file, wait } => apply(context, &file, wait.wait).await,
        ImageCommand::Get { name } => get(context, &name).await,
        ImageCommand::List { filter } => list(context, &filter).await,
        ImageCommand::Status { name } => status(context, &name).await,
        ImageCommand::Delete { name } => {
            ResourceClient::<Image>::delete(&context.client, &name, context.namespace()).await?;
            println!("{name:?} deleted");
            Ok(())
        }
        ImageCommand::Trigger { name } => {
            let outcome = save::trigger_image(
                &context.client,
                &name,
                context.namespace(),
                SystemTime::now(),
                context.conflict_check,
            )
            .await?;
            if outcome.is_changed() {
                println!("{name:?} triggered");
            } else {
                println!("nothing to patch");
            }
            Ok(())
        }
    }
}

async fn save_from_args(
    context: &Context,
    args: &ImageSaveArgs,
    mode: SaveMode,
) -> Result<(), Error> {
    let descriptor = args.descriptor();
    let factory = ImageFactory::new(&context.defaults, &UnavailableUploader);
    let client = &context.client;
    let namespace = context.namespace();

    let outcome = match mode {
        SaveMode::Create => {
            save::create_image(client, &factory, &args.name, namespace, &descriptor).await?
        }
        SaveMode::Patch => {
            save::patch_image(
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
            save::save_image(
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

async fn apply(context: &Context, file: &Path, wait: bool) -> Result<(), Error> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .context(ReadFileSnafu { path: file })?;
    let desired: Image =
        serde_yaml::from_str(&contents).context(ParseFileSnafu { path: file })?;

    let outcome = save::apply_image(
        &context.client,
        desired,
        context.namespace(),
        context.conflict_check,
    )
    .await?;

    if outcome.is_changed() {
        println!("{:?} applied", outcome.resource().name_any());
    } else {
        println!("{}", outcome_message(&outcome));
    }
    context.wait_if_requested(&outcome, wait).await?;
    Ok(())
}

async fn get(context: &Context, name: &str) -> Result<(), Error> {
    let image: Image = context.client.get(name, context.namespace()).await?;
    print!("{}", output::to_yaml("Image", &image)?);
    Ok(())
}

async fn list(context: &Context, filter: &[String]) -> Result<(), Error> {
    let selector = (!filter.is_empty()).then(|| filter.join(","));
    let images: Vec<Image> = context
        .client
        .list(context.namespace(), selector.as_deref())
        .await?;

    if images.is_empty() {
        println!("{}", output::nothing_found("image"));
        return Ok(());
    }
    print!("{}", image_table(&images).render()?);
    Ok(())
}

fn image_table(images: &[Image]) -> Table {
    let mut table = Table::new(["NAME", "READY", "LATEST IMAGE"]);
    for image in images {
        table.push_row(vec![
            image.name_any(),
            image.ready_status().to_string(),
            image.latest_image().unwrap_or_default().to_owned(),
        ]);
    }
    table
}

async fn status(context: &Context, name: &str) -> Result<(), Error> {
    let image: Image = context.client.get(name, context.namespace()).await?;
    print!("{}", image_details(&image)?);
    Ok(())
}

fn image_details(image: &Image) -> Result<String, output::Error> {
    let status = image.status.as_ref();
    let source = image.spec.source.source();
    let builder = &image.spec.builder;

    output::details([
        ("Status", image.ready_status().to_string()),
        ("Message", image.ready_message().to_owned()),
        (
            "Latest Image",
            image.latest_image().unwrap_or_default().to_owned(),
        ),
        (
            "Latest Build",
            status
                .and_then(|status| status.latest_build_ref.clone())
                .unwrap_or_default(),
        ),
        (
            "Latest Build Reason",
            status
                .and_then(|status| status.latest_build_reason.clone())
                .unwrap_or_default(),
        ),
        (
            "Latest Stack",
            status
                .and_then(|status| status.latest_stack.clone())
                .unwrap_or_default(),
        ),
        (
            "Source",
            source
                .as_ref()
                .map(|source| format!("{} {}", source.type_name(), source.location()))
                .unwrap_or_default(),
        ),
        ("Builder", format!("{} {}", builder.kind, builder.name)),
    ])
}
