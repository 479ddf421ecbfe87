use crate::{
    crd::{BuilderKind, BuilderReference},
    image::{ImageDescriptor, validation::ValidationError},
};

/// How the builder reference of an image changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuilderChange {
    Unchanged,
    /// A namespaced builder, which always lives in the namespace of the image.
    Builder(String),
    ClusterBuilder(String),
}

impl BuilderChange {
    /// The new reference for an image in `namespace`, or `None` if it stays as is.
    pub fn into_reference(self, namespace: &str) -> Option<BuilderReference> {
        match self {
            Self::Unchanged => None,
            Self::Builder(name) => Some(BuilderReference {
                kind: BuilderKind::Builder,
                name,
                namespace: Some(namespace.to_owned()),
            }),
            Self::ClusterBuilder(name) => Some(BuilderReference {
                kind: BuilderKind::ClusterBuilder,
                name,
                namespace: None,
            }),
        }
    }
}

pub fn select_builder(descriptor: &ImageDescriptor) -> Result<BuilderChange, ValidationError> {
    match (descriptor.builder(), descriptor.cluster_builder()) {
        (Some(_), Some(_)) => Err(ValidationError::AmbiguousBuilder),
        (Some(builder), None) => Ok(BuilderChange::Builder(builder.to_owned())),
        (None, Some(cluster_builder)) => {
            Ok(BuilderChange::ClusterBuilder(cluster_builder.to_owned()))
        }
        (None, None) => Ok(BuilderChange::Unchanged),
    }
}
