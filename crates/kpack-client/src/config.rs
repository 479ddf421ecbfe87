//! Default values the patch engines fall back to when a flag is not given.

use clap::Args;

pub const DEFAULT_GIT_REVISION: &str = "main";
pub const DEFAULT_CLUSTER_BUILDER: &str = "default";
pub const DEFAULT_CLUSTER_STACK: &str = "default";
pub const DEFAULT_CLUSTER_STORE: &str = "default";
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";
pub const DEFAULT_KPACK_NAMESPACE: &str = "kpack";

/// Defaults used when creating resources or resolving partial input.
///
/// This is passed explicitly into [`crate::image::factory::ImageFactory`] and
/// [`crate::custom_builder::BuilderFactory`], so that tests can use their own values.
#[derive(Clone, Debug, PartialEq, Eq, Args)]
#[command(next_help_heading = "Default Options")]
pub struct Defaults {
    /// Git revision used when `--git` is given without `--git-revision`.
    #[arg(long = "default-git-revision", env = "KP_DEFAULT_GIT_REVISION", default_value = DEFAULT_GIT_REVISION, global = true)]
    pub git_revision: String,

    /// ClusterBuilder new images are built with.
    #[arg(long = "default-cluster-builder", env = "KP_DEFAULT_CLUSTER_BUILDER", default_value = DEFAULT_CLUSTER_BUILDER, global = true)]
    pub cluster_builder: String,

    /// ClusterStack new builders are based on.
    #[arg(long = "default-cluster-stack", env = "KP_DEFAULT_CLUSTER_STACK", default_value = DEFAULT_CLUSTER_STACK, global = true)]
    pub cluster_stack: String,

    /// ClusterStore new builders take their buildpacks from.
    #[arg(long = "default-cluster-store", env = "KP_DEFAULT_CLUSTER_STORE", default_value = DEFAULT_CLUSTER_STORE, global = true)]
    pub cluster_store: String,

    /// Service account used by new builders and referenced by new ClusterBuilders.
    #[arg(long = "default-service-account", env = "KP_DEFAULT_SERVICE_ACCOUNT", default_value = DEFAULT_SERVICE_ACCOUNT, global = true)]
    pub service_account: String,

    /// Namespace kpack runs in. ClusterBuilder service accounts live there.
    #[arg(long = "kpack-namespace", env = "KP_KPACK_NAMESPACE", default_value = DEFAULT_KPACK_NAMESPACE, global = true)]
    pub kpack_namespace: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            git_revision: DEFAULT_GIT_REVISION.to_owned(),
            cluster_builder: DEFAULT_CLUSTER_BUILDER.to_owned(),
            cluster_stack: DEFAULT_CLUSTER_STACK.to_owned(),
            cluster_store: DEFAULT_CLUSTER_STORE.to_owned(),
            service_account: DEFAULT_SERVICE_ACCOUNT.to_owned(),
            kpack_namespace: DEFAULT_KPACK_NAMESPACE.to_owned(),
        }
    }
}
