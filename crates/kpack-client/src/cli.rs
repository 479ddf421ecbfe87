//! Command line options shared by every `kp` command.

use clap::Args;

/// Selects the cluster and namespace commands run against.
#[derive(Clone, Debug, Default, PartialEq, Eq, Args)]
#[command(next_help_heading = "Cluster Options")]
pub struct ClusterOptions {
    /// The kubeconfig context to use. Defaults to the current context.
    #[arg(long, env = "KP_CONTEXT", global = true)]
    pub context: Option<String>,

    /// The namespace to operate in. Defaults to the namespace of the kubeconfig context.
    #[arg(long, short = 'n', env = "KP_NAMESPACE", global = true)]
    pub namespace: Option<String>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::*;

    #[derive(Debug, Parser)]
    struct Opts {
        #[command(flatten)]
        cluster: ClusterOptions,
    }

    #[test]
    fn verify_cli() {
        Opts::command().debug_assert();
    }

    #[test]
    fn short_namespace_flag() {
        let opts = Opts::parse_from(["kp", "-n", "apps"]);

        assert_eq!(opts.cluster.namespace.as_deref(), Some("apps"));
        assert_eq!(opts.cluster.context, None);
    }
}
