use k8s_openapi::{
    api::core::v1::{EnvVar, ResourceRequirements},
    apimachinery::pkg::api::resource::Quantity,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::{
    condition::{Condition, impl_conditions},
    source::SourceConfig,
};

/// An image configuration: kpack keeps the image at `tag` built from `source` with `builder`.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kpack.io",
    version = "v1alpha2",
    kind = "Image",
    namespaced,
    status = "ImageStatus",
    shortname = "cnbimage",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    /// The registry tag the built image is pushed to.
    pub tag: String,

    /// Further tags, which must be unique.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_tags: Vec<String>,

    pub builder: BuilderReference,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<ImageCacheConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build: Option<ImageBuild>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_build_history_limit: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_build_history_limit: Option<i64>,
}

/// Points an image at the builder that builds it.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct BuilderReference {
    pub kind: BuilderKind,

    pub name: String,

    /// Only set for namespaced builders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize, strum::Display,
)]
pub enum BuilderKind {
    Builder,
    #[default]
    ClusterBuilder,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCacheConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<VolumeCache>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryCache>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeCache {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Quantity>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct RegistryCache {
    pub tag: String,
}

/// Settings passed on to every build of an image.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct ImageBuild {
    /// Environment variables, unique by name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,
}

impl ImageBuild {
    pub fn is_empty(&self) -> bool {
        self.env.is_empty() && self.resources.is_none()
    }
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_build_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_build_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_stack: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_counter: Option<i64>,
}

impl_conditions!(Image);

impl ImageSpec {
    pub fn env(&self) -> &[EnvVar] {
        self.build
            .as_ref()
            .map(|build| build.env.as_slice())
            .unwrap_or_default()
    }

    pub fn cache_size(&self) -> Option<&Quantity> {
        self.cache
            .as_ref()
            .and_then(|cache| cache.volume.as_ref())
            .and_then(|volume| volume.size.as_ref())
    }

    /// Sets the volume cache size, keeping any other cache settings.
    pub fn set_cache_size(&mut self, size: Quantity) {
        self.cache
            .get_or_insert_with(ImageCacheConfig::default)
            .volume
            .get_or_insert_with(VolumeCache::default)
            .size = Some(size);
    }
}

impl Image {
    pub fn latest_image(&self) -> Option<&str> {
        self.status
            .as_ref()
            .and_then(|status| status.latest_image.as_deref())
    }
}
