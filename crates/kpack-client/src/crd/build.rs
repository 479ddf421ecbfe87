use k8s_openapi::{
    api::core::v1::{EnvVar, ResourceRequirements},
    apimachinery::pkg::apis::meta::v1::Time,
};
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{
    condition::{Condition, ConditionStatus, Conditions, impl_conditions},
    source::SourceConfig,
};

/// Label kpack puts on every build, naming the image it belongs to.
pub const IMAGE_LABEL: &str = "image.kpack.io/image";

/// Label holding the sequence number of a build within its image.
pub const BUILD_NUMBER_LABEL: &str = "image.kpack.io/buildNumber";

/// Annotation listing why kpack started the build, e.g. `COMMIT` or `CONFIG`.
pub const REASON_ANNOTATION: &str = "image.kpack.io/reason";

/// Annotation that asks kpack to rebuild the image of this build.
pub const ADDITIONAL_BUILD_NEEDED_ANNOTATION: &str = "image.kpack.io/additionalBuildNeeded";

/// A single build of an image. Builds are created by kpack, `kp` only reads and annotates them.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kpack.io",
    version = "v1alpha2",
    kind = "Build",
    namespaced,
    status = "BuildStatus",
    shortname = "cnbbuild",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BuildSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    #[serde(default)]
    pub builder: BuildBuilderSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct BuildBuilderSpec {
    #[serde(default)]
    pub image: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<BuildStack>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl_conditions!(Build);

/// The state of a build as shown to users.
#[derive(Clone, Copy, Debug, Eq, PartialEq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BuildPhase {
    Building,
    Success,
    Failure,
}

impl Build {
    /// The build number from the [`BUILD_NUMBER_LABEL`], if it is present and numeric.
    pub fn build_number(&self) -> Option<i64> {
        self.labels()
            .get(BUILD_NUMBER_LABEL)
            .and_then(|number| number.parse().ok())
    }

    pub fn image_name(&self) -> Option<&str> {
        self.labels().get(IMAGE_LABEL).map(String::as_str)
    }

    pub fn reason(&self) -> Option<&str> {
        self.annotations().get(REASON_ANNOTATION).map(String::as_str)
    }

    pub fn phase(&self) -> BuildPhase {
        match self.ready_status() {
            ConditionStatus::True => BuildPhase::Success,
            ConditionStatus::False => BuildPhase::Failure,
            ConditionStatus::Unknown => BuildPhase::Building,
        }
    }

    pub fn latest_image(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.latest_image.as_deref())
    }

    pub fn started(&self) -> Option<&Time> {
        self.meta().creation_timestamp.as_ref()
    }

    /// When the build finished, taken from the transition of its `Ready` condition.
    pub fn finished(&self) -> Option<&Time> {
        match self.phase() {
            BuildPhase::Building => None,
            BuildPhase::Success | BuildPhase::Failure => self
                .ready_condition()
                .and_then(|condition| condition.last_transition_time.as_ref()),
        }
    }
}

/// Sorts builds by ascending build number; builds without a number go first.
pub fn sort_by_build_number(builds: &mut [Build]) {
    builds.sort_by_key(Build::build_number);
}

#[cfg(test)]
mod tests {
    use indoc::formatdoc;

    use super::*;

    fn build(number: &str, status: &str) -> Build {
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
                    image.kpack.io/reason: COMMIT
                spec:
                  builder:
                    image: registry.example.com/builder@sha256:abcd
                status:
                  conditions:
                  - type: Succeeded
                    status: \"{status}\"
                  - type: Ready
                    status: \"{status}\"
                    lastTransitionTime: \"2024-05-01T10:05:00Z\"
            "})
        .expect("test YAML is valid")
    }

    #[test]
    fn reads_labels_and_annotations() {
        let build = build("7", "True");

        assert_eq!(build.build_number(), Some(7));
        assert_eq!(build.image_name(), Some("petclinic"));
        assert_eq!(build.reason(), Some("COMMIT"));
        assert_eq!(build.phase(), BuildPhase::Success);
        assert!(build.started().is_some());
        assert!(build.finished().is_some());
    }

    #[test]
    fn running_build_is_not_finished() {
        let build = build("2", "Unknown");

        assert_eq!(build.phase(), BuildPhase::Building);
        assert_eq!(build.phase().to_string(), "BUILDING");
        assert!(build.finished().is_none());
    }

    #[test]
    fn sorts_numerically() {
        let mut builds = vec![build("10", "True"), build("9", "False"), build("1", "True")];

        sort_by_build_number(&mut builds);

        let numbers: Vec<_> = builds.iter().filter_map(Build::build_number).collect();
        assert_eq!(numbers, [1, 9, 10]);
    }
}
