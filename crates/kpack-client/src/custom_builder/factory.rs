use kube::ResourceExt;
use snafu::{ResultExt as _, Snafu};

use crate::{
    config::Defaults,
    crd::{BuilderTemplate, CoreReference},
    custom_builder::{BuilderDescriptor, CustomBuilder, ValidationError},
    patch::{self, Patch},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Validation { source: ValidationError },

    #[snafu(display("failed to compute patch for {kind} {name:?}"))]
    ComputePatch {
        source: patch::Error,
        kind: String,
        name: String,
    },
}

/// Builds new builders and mutated copies of existing ones from a [`BuilderDescriptor`].
pub struct BuilderFactory<'a> {
    defaults: &'a Defaults,
}

impl<'a> BuilderFactory<'a> {
    pub fn new(defaults: &'a Defaults) -> Self {
        Self { defaults }
    }

    /// Creates a new builder. Requires a tag and an order; stack, store and service account fall
    /// back to the defaults.
    pub fn make_builder<B: CustomBuilder>(
        &self,
        name: &str,
        namespace: &str,
        descriptor: &BuilderDescriptor,
    ) -> Result<B, Error> {
        let tag = descriptor
            .tag()
            .ok_or_else(|| missing_field("tag"))?
            .to_owned();
        let order = descriptor
            .resolve_order()?
            .filter(|order| !order.is_empty())
            .ok_or_else(|| missing_field("order"))?;

        let template = BuilderTemplate {
            tag,
            stack: Some(CoreReference::cluster_stack(
                descriptor.stack().unwrap_or(&self.defaults.cluster_stack),
            )),
            store: Some(CoreReference::cluster_store(
                descriptor.store().unwrap_or(&self.defaults.cluster_store),
            )),
            order,
        };
        let service_account = descriptor
            .service_account()
            .unwrap_or(&self.defaults.service_account);

        Ok(B::from_template(
            name,
            namespace,
            template,
            service_account,
            self.defaults,
        ))
    }

    /// Returns a copy of `existing` where every field given in `descriptor` is replaced.
    pub fn update_builder<B: CustomBuilder>(
        &self,
        existing: &B,
        descriptor: &BuilderDescriptor,
    ) -> Result<B, Error> {
        let order = descriptor.resolve_order()?;

        let mut builder = existing.clone();
        let template = builder.template_mut();
        if let Some(tag) = descriptor.tag() {
            tag.clone_into(&mut template.tag);
        }
        if let Some(stack) = descriptor.stack() {
            template.stack = Some(CoreReference::cluster_stack(stack));
        }
        if let Some(store) = descriptor.store() {
            template.store = Some(CoreReference::cluster_store(store));
        }
        if let Some(order) = order {
            template.order = order;
        }

        if let Some(service_account) = descriptor.service_account() {
            builder.set_service_account(service_account, self.defaults);
        }

        Ok(builder)
    }

    /// Like [`Self::update_builder`], also returning the patch from `existing` to the result.
    pub fn make_patch<B: CustomBuilder>(
        &self,
        existing: &B,
        descriptor: &BuilderDescriptor,
    ) -> Result<(B, Patch), Error> {
        let updated = self.update_builder(existing, descriptor)?;
        let patch = patch::diff_resources(existing, &updated).with_context(|_| {
            ComputePatchSnafu {
                kind: B::kind_name(),
                name: existing.name_any(),
            }
        })?;

        Ok((updated, patch))
    }
}

fn missing_field(field: &str) -> ValidationError {
    ValidationError::MissingRequiredField {
        field: field.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;
    use crate::{
        crd::{Builder, ClusterBuilder, OrderEntry},
        custom_builder::parse_buildpack,
        patch::Operation,
    };

    fn existing() -> ClusterBuilder {
        serde_yaml::from_str(indoc! {"
            apiVersion: kpack.io/v1alpha2
            kind: ClusterBuilder
            metadata:
              name: base
            spec:
              tag: registry.example.com/builders/base
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
        "})
        .expect("test YAML is valid")
    }

    #[test]
    fn new_builder_uses_defaults() {
        let defaults = Defaults::default();
        let factory = BuilderFactory::new(&defaults);
        let descriptor = BuilderDescriptor {
            tag: Some("registry.example.com/builders/team".to_owned()),
            buildpacks: vec!["paketo-buildpacks/go@4.0.0".to_owned()],
            ..BuilderDescriptor::default()
        };

        let builder: Builder = factory
            .make_builder("team", "apps", &descriptor)
            .expect("builder is valid");

        assert_eq!(builder.metadata.namespace.as_deref(), Some("apps"));
        assert_eq!(
            builder.spec.template.stack,
            Some(CoreReference::cluster_stack("default"))
        );
        assert_eq!(
            builder.spec.template.store,
            Some(CoreReference::cluster_store("default"))
        );
        assert_eq!(builder.spec.service_account_name.as_deref(), Some("default"));
        assert_eq!(builder.spec.template.order.len(), 1);
    }

    #[test]
    fn new_builder_requires_tag_then_order() {
        let defaults = Defaults::default();
        let factory = BuilderFactory::new(&defaults);

        let error = factory
            .make_builder::<ClusterBuilder>("base", "", &BuilderDescriptor::default())
            .expect_err("tag is missing");
        assert_eq!(error.to_string(), "tag is required");

        let descriptor = BuilderDescriptor {
            tag: Some("registry.example.com/builders/base".to_owned()),
            ..BuilderDescriptor::default()
        };
        let error = factory
            .make_builder::<ClusterBuilder>("base", "", &descriptor)
            .expect_err("order is missing");
        assert_eq!(error.to_string(), "order is required");
    }

    #[test]
    fn stack_change_is_a_single_replace() {
        let defaults = Defaults::default();
        let factory = BuilderFactory::new(&defaults);
        let descriptor = BuilderDescriptor {
            stack: Some("full".to_owned()),
            ..BuilderDescriptor::default()
        };

        let (_, patch) = factory
            .make_patch(&existing(), &descriptor)
            .expect("patch is valid");

        assert_eq!(
            patch.operations(),
            [Operation::Replace {
                path: "/spec/stack/name".to_owned(),
                value: json!("full"),
            }]
        );
    }

    #[test]
    fn buildpacks_replace_the_order() {
        let defaults = Defaults::default();
        let factory = BuilderFactory::new(&defaults);
        let descriptor = BuilderDescriptor {
            buildpacks: vec!["paketo-buildpacks/nodejs".to_owned()],
            ..BuilderDescriptor::default()
        };

        let updated = factory
            .update_builder(&existing(), &descriptor)
            .expect("update is valid");

        assert_eq!(
            updated.spec.template.order,
            [OrderEntry {
                group: vec![
                    parse_buildpack("paketo-buildpacks/nodejs").expect("buildpack is valid")
                ],
            }]
        );
    }

    #[test]
    fn empty_descriptor_is_nothing_to_patch() {
        let defaults = Defaults::default();
        let factory = BuilderFactory::new(&defaults);

        let (_, patch) = factory
            .make_patch(&existing(), &BuilderDescriptor::default())
            .expect("patch is valid");

        assert!(patch.is_empty());
    }
}
