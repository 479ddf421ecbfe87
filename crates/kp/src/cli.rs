use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use kpack_client::{
    cli::ClusterOptions,
    config::Defaults,
    custom_builder::BuilderDescriptor,
    image::{EnvAssignment, ImageDescriptor},
    secret::SecretDescriptor,
};

#[derive(Debug, Parser)]
#[command(name = "kp", author, version, about = "Command line client for kpack")]
pub struct Opts {
    #[command(flatten)]
    pub cluster: ClusterOptions,

    #[command(flatten)]
    pub write: WriteOptions,

    #[command(flatten)]
    pub defaults: Defaults,

    #[command(subcommand)]
    pub command: Command,
}

/// How changes are sent and awaited.
#[derive(Clone, Debug, PartialEq, Eq, Args)]
#[command(next_help_heading = "Write Options")]
pub struct WriteOptions {
    /// How long `--wait` waits for a resource to become ready, e.g. 90s or 10m.
    #[arg(long, env = "KP_WAIT_TIMEOUT", default_value = "10m", value_parser = humantime::parse_duration, global = true)]
    pub wait_timeout: Duration,

    /// Patch even if the resource was changed by someone else since it was read.
    #[arg(long, global = true)]
    pub no_conflict_check: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage images, the configuration kpack keeps built.
    #[command(subcommand)]
    Image(ImageCommand),

    /// Inspect the builds of an image.
    #[command(subcommand)]
    Build(BuildCommand),

    /// Manage namespaced builders.
    #[command(subcommand)]
    Builder(BuilderCommand),

    /// Manage cluster-scoped builders.
    #[command(subcommand, name = "clusterbuilder")]
    ClusterBuilder(BuilderCommand),

    /// Inspect cluster stacks.
    #[command(subcommand, name = "clusterstack")]
    ClusterStack(StackCommand),

    /// Manage registry and git credentials.
    #[command(subcommand)]
    Secret(SecretCommand),
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// Create an image. Fails if it already exists.
    Create(ImageSaveArgs),

    /// Patch an existing image.
    Patch(ImageSaveArgs),

    /// Create an image, or patch it if it exists.
    Save(ImageSaveArgs),

    /// Create or update an image from a YAML file.
    Apply {
        #[arg(long, short = 'f')]
        file: PathBuf,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Print an image as YAML.
    Get { name: String },

    /// List images.
    List {
        /// Only list images with this label, as KEY=VALUE.
        #[arg(long)]
        filter: Vec<String>,
    },

    /// Show the status of an image.
    Status { name: String },

    Delete { name: String },

    /// Build an image again with its current configuration.
    Trigger { name: String },
}

#[derive(Debug, Args)]
pub struct ImageSaveArgs {
    pub name: String,

    /// Registry tag the built image is pushed to.
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Git repository URL to build from.
    #[arg(long)]
    pub git: Option<String>,

    /// Git revision, defaults to the default git revision when `--git` is given.
    #[arg(long)]
    pub git_revision: Option<String>,

    /// URL of a source archive to build from.
    #[arg(long)]
    pub blob: Option<String>,

    /// Local directory to upload and build from.
    #[arg(long)]
    pub local_path: Option<PathBuf>,

    /// Where to push the local source code, defaults to the image tag with a `-source` suffix.
    #[arg(long)]
    pub local_path_destination_image: Option<String>,

    /// Directory inside the source to build. An empty value builds the source root.
    #[arg(long)]
    pub sub_path: Option<String>,

    #[arg(long, short = 'b')]
    pub builder: Option<String>,

    #[arg(long, short = 'c')]
    pub cluster_builder: Option<String>,

    /// Build-time environment variable as KEY=VALUE.
    #[arg(long, short = 'e')]
    pub env: Vec<EnvAssignment>,

    /// Build-time environment variable to remove.
    #[arg(long, short = 'd')]
    pub delete_env: Vec<String>,

    #[arg(long)]
    pub additional_tag: Vec<String>,

    #[arg(long)]
    pub delete_additional_tag: Vec<String>,

    /// Size of the build cache volume, e.g. 2G. Can only grow.
    #[arg(long)]
    pub cache_size: Option<String>,

    #[arg(long)]
    pub service_account: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,
}

impl ImageSaveArgs {
    pub fn descriptor(&self) -> ImageDescriptor {
        ImageDescriptor {
            tag: self.tag.clone(),
            git_repo: self.git.clone(),
            git_revision: self.git_revision.clone(),
            blob_url: self.blob.clone(),
            local_path: self.local_path.clone(),
            local_path_destination_image: self.local_path_destination_image.clone(),
            sub_path: self.sub_path.clone(),
            builder: self.builder.clone(),
            cluster_builder: self.cluster_builder.clone(),
            env_set: self.env.clone(),
            env_delete: self.delete_env.clone(),
            additional_tags_set: self.additional_tag.clone(),
            additional_tags_delete: self.delete_additional_tag.clone(),
            cache_size: self.cache_size.clone(),
            service_account: self.service_account.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Args)]
pub struct WaitArgs {
    /// Wait until kpack reports the resource as ready.
    #[arg(long, short = 'w')]
    pub wait: bool,
}

#[derive(Debug, Subcommand)]
pub enum BuildCommand {
    /// List builds, of all images or of one.
    List { image: Option<String> },

    /// Show the status of the latest or a specific build of an image.
    Status {
        image: String,

        /// The build number, defaults to the latest build.
        #[arg(long, short = 'b')]
        build: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BuilderCommand {
    /// Create a builder. Fails if it already exists.
    Create(BuilderSaveArgs),

    /// Patch an existing builder.
    Patch(BuilderSaveArgs),

    /// Create a builder, or patch it if it exists.
    Save(BuilderSaveArgs),

    /// Print a builder as YAML.
    Get { name: String },

    List,

    /// Show the status and buildpacks of a builder.
    Status { name: String },

    Delete { name: String },
}

#[derive(Debug, Args)]
pub struct BuilderSaveArgs {
    pub name: String,

    /// Registry tag the builder image is pushed to.
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// ClusterStack to base the builder on.
    #[arg(long, short = 's')]
    pub stack: Option<String>,

    /// ClusterStore to take buildpacks from.
    #[arg(long)]
    pub store: Option<String>,

    /// Path to a YAML file with the buildpack order.
    #[arg(long, short = 'o')]
    pub order: Option<PathBuf>,

    /// Buildpack as ID or ID@VERSION, all given buildpacks form one group.
    #[arg(long, short = 'b')]
    pub buildpack: Vec<String>,

    #[arg(long)]
    pub service_account: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,
}

impl BuilderSaveArgs {
    /// The order file is read by the caller.
    pub fn descriptor(&self) -> BuilderDescriptor {
        BuilderDescriptor {
            tag: self.tag.clone(),
            stack: self.stack.clone(),
            store: self.store.clone(),
            order: None,
            buildpacks: self.buildpack.clone(),
            service_account: self.service_account.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum StackCommand {
    List,

    /// Show the status of a cluster stack.
    Status { name: String },
}

#[derive(Debug, Subcommand)]
pub enum SecretCommand {
    /// Create a secret and link it to the service account.
    Create(SecretCreateArgs),

    /// List secrets holding registry or git credentials.
    List,

    /// Unlink a secret from the service account and delete it.
    Delete {
        name: String,

        /// Service account the secret is linked to.
        #[arg(long)]
        service_account: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct SecretCreateArgs {
    pub name: String,

    /// Docker Hub user, the password is read from DOCKER_PASSWORD.
    #[arg(long)]
    pub dockerhub: Option<String>,

    /// Registry URL, the password is read from REGISTRY_PASSWORD.
    #[arg(long)]
    pub registry: Option<String>,

    #[arg(long)]
    pub registry_user: Option<String>,

    /// Git server URL.
    #[arg(long)]
    pub git_url: Option<String>,

    /// Git user, the password is read from GIT_PASSWORD.
    #[arg(long)]
    pub git_user: Option<String>,

    /// Path to a private key for git over SSH.
    #[arg(long)]
    pub git_ssh_key: Option<PathBuf>,

    /// Service account to link the secret to, defaults to the default service account.
    #[arg(long)]
    pub service_account: Option<String>,
}

impl SecretCreateArgs {
    /// The private key file is read by the caller.
    pub fn descriptor(&self, git_ssh_key: Option<String>) -> SecretDescriptor {
        SecretDescriptor {
            dockerhub: self.dockerhub.clone(),
            registry: self.registry.clone(),
            registry_user: self.registry_user.clone(),
            git_url: self.git_url.clone(),
            git_user: self.git_user.clone(),
            git_ssh_key,
        }
    }
}
