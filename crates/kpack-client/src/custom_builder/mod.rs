//! Creating and patching `Builder` and `ClusterBuilder` resources.
//!
//! Both kinds share a [`BuilderTemplate`] and only differ in how they name their service account,
//! so the factory and save logic are written once against the [`CustomBuilder`] trait.

use k8s_openapi::api::core::v1::ObjectReference;
use serde::Deserialize;
use snafu::{ResultExt as _, Snafu};

use crate::{
    client::Scoped,
    config::Defaults,
    crd::{
        Builder, BuilderSpec, BuilderStatus, BuilderTemplate, BuildpackRef, ClusterBuilder,
        ClusterBuilderSpec, Conditions, OrderEntry,
    },
};

pub mod factory;
pub mod save;

pub use factory::BuilderFactory;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationError {
    #[snafu(display("an order file and buildpacks can not be used together"))]
    AmbiguousOrder,

    #[snafu(display("invalid buildpack {input:?}, expected ID or ID@VERSION"))]
    InvalidBuildpack { input: String },

    #[snafu(display("{field} is required"))]
    MissingRequiredField { field: String },
}

#[derive(Debug, Snafu)]
#[snafu(display("failed to parse builder order"))]
pub struct ParseOrderError {
    source: serde_yaml::Error,
}

/// The desired changes to a builder, as given on the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuilderDescriptor {
    pub tag: Option<String>,
    pub stack: Option<String>,
    pub store: Option<String>,
    /// The order read from an order file.
    pub order: Option<Vec<OrderEntry>>,
    /// Buildpacks given as `ID` or `ID@VERSION`, forming a single order group.
    pub buildpacks: Vec<String>,
    pub service_account: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

impl BuilderDescriptor {
    pub fn tag(&self) -> Option<&str> {
        non_empty(self.tag.as_deref())
    }

    pub fn stack(&self) -> Option<&str> {
        non_empty(self.stack.as_deref())
    }

    pub fn store(&self) -> Option<&str> {
        non_empty(self.store.as_deref())
    }

    pub fn service_account(&self) -> Option<&str> {
        non_empty(self.service_account.as_deref())
    }

    /// The order to set, or `None` to keep the existing one.
    pub fn resolve_order(&self) -> Result<Option<Vec<OrderEntry>>, ValidationError> {
        if self.buildpacks.is_empty() {
            return Ok(self.order.clone());
        }

        if self.order.is_some() {
            return AmbiguousOrderSnafu.fail();
        }

        let group = self
            .buildpacks
            .iter()
            .map(String::as_str)
            .map(parse_buildpack)
            .collect::<Result<_, _>>()?;
        Ok(Some(vec![OrderEntry { group }]))
    }
}

/// Parses `ID` or `ID@VERSION`.
pub fn parse_buildpack(input: &str) -> Result<BuildpackRef, ValidationError> {
    let (id, version) = match input.split_once('@') {
        Some((id, version)) => (id, Some(version)),
        None => (input, None),
    };

    if id.is_empty() || version.is_some_and(str::is_empty) {
        return InvalidBuildpackSnafu { input }.fail();
    }

    Ok(BuildpackRef {
        id: id.to_owned(),
        version: version.map(str::to_owned),
        optional: None,
    })
}

/// Order files either contain the list of groups directly or nest it under `order`, like a
/// builder spec does.
#[derive(Deserialize)]
#[serde(untagged)]
enum OrderFile {
    Wrapped { order: Vec<OrderEntry> },
    Bare(Vec<OrderEntry>),
}

pub fn parse_order(contents: &str) -> Result<Vec<OrderEntry>, ParseOrderError> {
    let file: OrderFile = serde_yaml::from_str(contents).context(ParseOrderSnafu)?;

    Ok(match file {
        OrderFile::Wrapped { order } | OrderFile::Bare(order) => order,
    })
}

/// A kpack builder resource, namespaced or cluster-scoped.
pub trait CustomBuilder: Scoped + Conditions {
    /// Creates a new builder. `namespace` is ignored for cluster-scoped builders.
    fn from_template(
        name: &str,
        namespace: &str,
        template: BuilderTemplate,
        service_account: &str,
        defaults: &Defaults,
    ) -> Self;

    fn template(&self) -> &BuilderTemplate;

    fn template_mut(&mut self) -> &mut BuilderTemplate;

    fn set_service_account(&mut self, service_account: &str, defaults: &Defaults);

    fn builder_status(&self) -> Option<&BuilderStatus>;

    fn latest_image(&self) -> Option<&str> {
        self.builder_status()
            .and_then(|status| status.latest_image.as_deref())
    }

    /// The id of the stack the builder was last built with.
    fn stack_id(&self) -> Option<&str> {
        self.builder_status()
            .and_then(|status| status.stack.as_ref())
            .and_then(|stack| stack.id.as_deref())
    }
}

impl CustomBuilder for Builder {
    fn from_template(
        name: &str,
        namespace: &str,
        template: BuilderTemplate,
        service_account: &str,
        _defaults: &Defaults,
    ) -> Self {
        let mut builder = Self::new(
            name,
            BuilderSpec {
                template,
                service_account_name: Some(service_account.to_owned()),
            },
        );
        builder.metadata.namespace = Some(namespace.to_owned());
        builder
    }

    fn template(&self) -> &BuilderTemplate {
        &self.spec.template
    }

    fn template_mut(&mut self) -> &mut BuilderTemplate {
        &mut self.spec.template
    }

    fn set_service_account(&mut self, service_account: &str, _defaults: &Defaults) {
        self.spec.service_account_name = Some(service_account.to_owned());
    }

    fn builder_status(&self) -> Option<&BuilderStatus> {
        self.status.as_ref()
    }
}

impl CustomBuilder for ClusterBuilder {
    fn from_template(
        name: &str,
        _namespace: &str,
        template: BuilderTemplate,
        service_account: &str,
        defaults: &Defaults,
    ) -> Self {
        Self::new(
            name,
            ClusterBuilderSpec {
                template,
                service_account_ref: Some(service_account_ref(
                    &defaults.kpack_namespace,
                    service_account,
                )),
            },
        )
    }

    fn template(&self) -> &BuilderTemplate {
        &self.spec.template
    }

    fn template_mut(&mut self) -> &mut BuilderTemplate {
        &mut self.spec.template
    }

    /// Keeps the namespace of an existing reference, otherwise uses the kpack namespace.
    fn set_service_account(&mut self, service_account: &str, defaults: &Defaults) {
        let namespace = self
            .spec
            .service_account_ref
            .as_ref()
            .and_then(|reference| reference.namespace.as_deref())
            .unwrap_or(&defaults.kpack_namespace);

        self.spec.service_account_ref = Some(service_account_ref(namespace, service_account));
    }

    fn builder_status(&self) -> Option<&BuilderStatus> {
        self.status.as_ref()
    }
}

fn service_account_ref(namespace: &str, name: &str) -> ObjectReference {
    ObjectReference {
        namespace: Some(namespace.to_owned()),
        name: Some(name.to_owned()),
        ..ObjectReference::default()
    }
}
