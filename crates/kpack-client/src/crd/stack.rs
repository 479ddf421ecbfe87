use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::condition::{Condition, impl_conditions};

/// A pair of build and run images that builders are based on.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kpack.io",
    version = "v1alpha2",
    kind = "ClusterStack",
    status = "ClusterStackStatus",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStackSpec {
    pub id: String,

    pub build_image: StackImage,

    pub run_image: StackImage,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct StackImage {
    pub image: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStackStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_image: Option<ResolvedStackImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_image: Option<ResolvedStackImage>,
}

/// A stack image pinned to a digest by kpack.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStackImage {
    #[serde(default)]
    pub latest_image: String,

    #[serde(default)]
    pub image: String,
}

impl_conditions!(ClusterStack);

impl ClusterStack {
    /// The digest-pinned run image if kpack resolved it, otherwise the configured one.
    pub fn run_image(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|status| status.run_image.as_ref())
            .map(|image| image.latest_image.as_str())
            .filter(|image| !image.is_empty())
            .unwrap_or(&self.spec.run_image.image)
    }

    pub fn build_image(&self) -> &str {
        self.status
            .as_ref()
            .and_then(|status| status.build_image.as_ref())
            .map(|image| image.latest_image.as_str())
            .filter(|image| !image.is_empty())
            .unwrap_or(&self.spec.build_image.image)
    }
}
