use kpack_client::{
    client::{self, ResourceClient},
    crd::{
        Build, Conditions,
        build::{IMAGE_LABEL, sort_by_build_number},
    },
};
use snafu::Snafu;

use crate::{
    cli::BuildCommand,
    commands::Context,
    output::{self, Table, format_time},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("image {image:?} has no builds"))]
    NoBuilds { image: String },

    #[snafu(display("build {number} of image {image:?} not found"))]
    BuildNotFound { image: String, number: i64 },

    #[snafu(transparent)]
    Client { source: client::Error },

    #[snafu(transparent)]
    Output { source: output::Error },
}

pub async fn run(context: &Context, command: BuildCommand) -> Result<(), Error> {
    match command {
        BuildCommand::List { image } => {
            let builds = list_builds(context, image.as_deref()).await?;
            if builds.is_empty() {
                println!("{}", output::nothing_found("build"));
            } else {
                print!("{}", build_table(&builds).render()?);
            }
            Ok(())
        }
        BuildCommand::Status { image, build } => {
            let builds = list_builds(context, Some(&image)).await?;
            let build = select_build(builds, &image, build)?;
            print!("{}", build_details(&build)?);
            Ok(())
        }
    }
}

/// Lists builds in ascending order, optionally only those of `image`.
async fn list_builds(context: &Context, image: Option<&str>) -> Result<Vec<Build>, Error> {
    let selector = image.map(|image| format!("{IMAGE_LABEL}={image}"));
    let mut builds: Vec<Build> = context
        .client
        .list(context.namespace(), selector.as_deref())
        .await?;
    sort_by_build_number(&mut builds);
    Ok(builds)
}

/// Picks build `number`, or the latest build if no number is given.
fn select_build(builds: Vec<Build>, image: &str, number: Option<i64>) -> Result<Build, Error> {
    let selected = match number {
        Some(number) => builds
            .into_iter()
            .find(|build| build.build_number() == Some(number))
            .ok_or_else(|| Error::BuildNotFound {
                image: image.to_owned(),
                number,
            })?,
        None => builds.into_iter().last().ok_or_else(|| Error::NoBuilds {
            image: image.to_owned(),
        })?,
    };
    Ok(selected)
}

fn build_table(builds: &[Build]) -> Table {
    let mut table = Table::new(["BUILD", "STATUS", "IMAGE", "STARTED", "FINISHED", "REASON"]);
    for build in builds {
        table.push_row(vec![
            build
                .build_number()
                .map(|number| number.to_string())
                .unwrap_or_default(),
            build.phase().to_string(),
            build.latest_image().unwrap_or_default().to_owned(),
            format_time(build.started()),
            format_time(build.finished()),
            build.reason().unwrap_or_default().to_owned(),
        ]);
    }
    table
}

fn build_details(build: &Build) -> Result<String, output::Error> {
    let status = build.status.as_ref();

    output::details([
        ("Image", build.latest_image().unwrap_or_default().to_owned()),
        ("Status", build.phase().to_string()),
        ("Reason", build.reason().unwrap_or_default().to_owned()),
        ("Message", build.ready_message().to_owned()),
        ("Started", format_time(build.started())),
        ("Finished", format_time(build.finished())),
        (
            "Pod Name",
            status
                .and_then(|status| status.pod_name.clone())
                .unwrap_or_default(),
        ),
        ("Builder", build.spec.builder.image.clone()),
        (
            "Run Image",
            status
                .and_then(|status| status.stack.as_ref())
                .and_then(|stack| stack.run_image.clone())
                .unwrap_or_default(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use indoc::{formatdoc, indoc};

    use super::*;

    fn build(number: i64, status: &str) -> Build {
        serde_yaml::from_str(&formatdoc! {"
            apiVersion: kpack.io/v1alpha2
            kind: Build
            metadata:
              name: petclinic-build-{number}
              namespace: apps
              creationTimestamp: \"2024-05-01T10:00:00Z\"
              labels:
                image.kpack.io/image: petclinic
                image.kpack.io/buildNumber: \"{number}\"
              annotations:
                image.kpack.io/reason: CONFIG
            spec:
              builder:
                image: registry.example.com/builder@sha256:abcd
            status:
              latestImage: registry.example.com/apps/petclinic@sha256:000{number}
              conditions:
              - type: Ready
                status: \"{status}\"
                lastTransitionTime: \"2024-05-01T10:05:00Z\"
        "})
        .expect("test YAML is valid")
    }

    #[test]
    fn lists_builds() {
        let rendered = build_table(&[build(1, "True"), build(2, "Unknown")])
            .render()
            .expect("table renders");

        assert_eq!(
            rendered,
            indoc! {"
                BUILD   STATUS     IMAGE                                             STARTED                FINISHED               REASON
                1       SUCCESS    registry.example.com/apps/petclinic@sha256:0001   2024-05-01T10:00:00Z   2024-05-01T10:05:00Z   CONFIG
                2       BUILDING   registry.example.com/apps/petclinic@sha256:0002   2024-05-01T10:00:00Z                          CONFIG
            "}
        );
    }

    #[test]
    fn selects_latest_build_by_default() {
        let builds = vec![build(1, "True"), build(2, "False")];

        let selected = select_build(builds, "petclinic", None).expect("a build exists");

        assert_eq!(selected.build_number(), Some(2));
    }

    #[test]
    fn selects_build_by_number() {
        let builds = vec![build(1, "True"), build(2, "False")];

        let selected = select_build(builds, "petclinic", Some(1)).expect("build 1 exists");

        assert_eq!(selected.build_number(), Some(1));
    }

    #[test]
    fn missing_build_number() {
        let error = select_build(vec![build(1, "True")], "petclinic", Some(7))
            .expect_err("build 7 does not exist");

        assert_eq!(error.to_string(), "build 7 of image \"petclinic\" not found");
    }

    #[test]
    fn image_without_builds() {
        let error = select_build(Vec::new(), "petclinic", None).expect_err("there are no builds");

        assert_eq!(error.to_string(), "image \"petclinic\" has no builds");
    }
}
