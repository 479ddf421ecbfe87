use k8s_openapi::api::core::v1::ObjectReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::crd::condition::{Condition, impl_conditions};

/// The parts shared by namespaced and cluster-scoped builders.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderTemplate {
    /// The registry tag the builder image is pushed to.
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<CoreReference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store: Option<CoreReference>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<OrderEntry>,
}

/// Reference to a cluster-scoped kpack resource such as a `ClusterStack` or `ClusterStore`.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct CoreReference {
    pub kind: String,
    pub name: String,
}

impl CoreReference {
    pub fn cluster_stack(name: impl Into<String>) -> Self {
        Self {
            kind: "ClusterStack".to_owned(),
            name: name.into(),
        }
    }

    pub fn cluster_store(name: impl Into<String>) -> Self {
        Self {
            kind: "ClusterStore".to_owned(),
            name: name.into(),
        }
    }
}

/// One group of buildpacks the lifecycle tries during detection.
#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct OrderEntry {
    #[serde(default)]
    pub group: Vec<BuildpackRef>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize)]
pub struct BuildpackRef {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

/// A namespaced builder, pushed with the credentials of a service account in the same namespace.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kpack.io",
    version = "v1alpha2",
    kind = "Builder",
    namespaced,
    status = "BuilderStatus",
    shortname = "bldr",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct BuilderSpec {
    #[serde(flatten)]
    pub template: BuilderTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,
}

/// A cluster-scoped builder. Its service account has to be referenced including its namespace.
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "kpack.io",
    version = "v1alpha2",
    kind = "ClusterBuilder",
    status = "BuilderStatus",
    shortname = "clstbldr",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBuilderSpec {
    #[serde(flatten)]
    pub template: BuilderTemplate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_ref: Option<ObjectReference>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<BuilderStack>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub builder_metadata: Vec<BuildpackMetadata>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuilderStack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// A buildpack the builder image actually contains.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildpackMetadata {
    pub id: String,

    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
}

impl_conditions!(Builder, ClusterBuilder);

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::crd::condition::{ConditionStatus, Conditions};

    #[test]
    fn flattens_template() {
        let builder: ClusterBuilder = serde_yaml::from_str(indoc! {"
            apiVersion: kpack.io/v1alpha2
            kind: ClusterBuilder
            metadata:
              name: default
            spec:
              tag: registry.example.com/builders/default
              stack:
                kind: ClusterStack
                name: base
              store:
                kind: ClusterStore
                name: default
              serviceAccountRef:
                namespace: kpack
                name: default
              order:
              - group:
                - id: paketo-buildpacks/java
                  version: 9.0.0
              - group:
                - id: paketo-buildpacks/nodejs
            status:
              conditions:
              - type: Ready
                status: \"True\"
              latestImage: registry.example.com/builders/default@sha256:beef
        "})
        .expect("test YAML is valid");

        let template = &builder.spec.template;
        assert_eq!(template.stack, Some(CoreReference::cluster_stack("base")));
        assert_eq!(template.store, Some(CoreReference::cluster_store("default")));
        assert_eq!(template.order.len(), 2);
        assert_eq!(template.order[0].group[0].version.as_deref(), Some("9.0.0"));
        assert_eq!(builder.ready_status(), ConditionStatus::True);

        let reference = builder
            .spec
            .service_account_ref
            .expect("service account is referenced");
        assert_eq!(reference.namespace.as_deref(), Some("kpack"));
    }
}
