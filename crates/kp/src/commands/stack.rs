use kpack_client::{
    client::{self, ResourceClient as _},
    crd::{ClusterStack, Conditions},
};
use kube::ResourceExt;
use snafu::Snafu;

use crate::{
    cli::StackCommand,
    commands::Context,
    output::{self, Table},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Client { source: client::Error },

    #[snafu(transparent)]
    Output { source: output::Error },
}

pub async fn run(context: &Context, command: StackCommand) -> Result<(), Error> {
    match command {
        StackCommand::List => {
            let stacks: Vec<ClusterStack> = context.client.list("", None).await?;
            if stacks.is_empty() {
                println!("{}", output::nothing_found("clusterstack"));
            } else {
                print!("{}", stack_table(&stacks).render()?);
            }
        }
        StackCommand::Status { name } => {
            let stack: ClusterStack = context.client.get(&name, "").await?;
            print!("{}", stack_details(&stack)?);
        }
    }
    Ok(())
}

/// The id kpack resolved, falling back to the configured one.
fn stack_id(stack: &ClusterStack) -> &str {
    stack
        .status
        .as_ref()
        .and_then(|status| status.id.as_deref())
        .unwrap_or(&stack.spec.id)
}

fn stack_table(stacks: &[ClusterStack]) -> Table {
    let mut table = Table::new(["NAME", "READY", "ID"]);
    for stack in stacks {
        table.push_row(vec![
            stack.name_any(),
            stack.ready_status().to_string(),
            stack_id(stack).to_owned(),
        ]);
    }
    table
}

fn stack_details(stack: &ClusterStack) -> Result<String, output::Error> {
    output::details([
        ("Status", stack.ready_status().to_string()),
        ("Message", stack.ready_message().to_owned()),
        ("Id", stack_id(stack).to_owned()),
        ("Build Image", stack.build_image().to_owned()),
        ("Run Image", stack.run_image().to_owned()),
    ])
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn stack() -> ClusterStack {
        serde_yaml::from_str(indoc! {"
            apiVersion: kpack.io/v1alpha2
            kind: ClusterStack
            metadata:
              name: base
            spec:
              id: io.buildpacks.stacks.jammy
              buildImage:
                image: paketobuildpacks/build-jammy-base
              runImage:
                image: paketobuildpacks/run-jammy-base
            status:
              conditions:
              - type: Ready
                status: \"False\"
                message: run image not found
        "})
        .expect("test YAML is valid")
    }

    #[test]
    fn lists_stacks() {
        let rendered = stack_table(&[stack()]).render().expect("table renders");

        assert_eq!(
            rendered,
            indoc! {"
                NAME   READY   ID
                base   False   io.buildpacks.stacks.jammy
            "}
        );
    }

    #[test]
    fn shows_stack_status() {
        let rendered = stack_details(&stack()).expect("details render");

        assert_eq!(
            rendered,
            indoc! {"
                Status:        False
                Message:       run image not found
                Id:            io.buildpacks.stacks.jammy
                Build Image:   paketobuildpacks/build-jammy-base
                Run Image:     paketobuildpacks/run-jammy-base
            "}
        );
    }
}
