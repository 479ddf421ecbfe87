//! The checks an [`ImageDescriptor`] has to pass before anything is changed.
//!
//! Checks run in a fixed order and stop at the first failure, so the same input always reports
//! the same error.

use std::str::FromStr;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use snafu::Snafu;

use crate::{
    config::Defaults,
    crd::ImageSpec,
    image::{
        ImageDescriptor,
        builder::{BuilderChange, select_builder},
        source::{SourceChange, select_source},
    },
    merge,
    quantity::Quantity,
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ValidationError {
    #[snafu(display("image source must be one of git, blob or local-path"))]
    AmbiguousSource,

    #[snafu(display("git-revision can only be used with a git source"))]
    IncompatibleGitRevision,

    #[snafu(display("image builder must be either a builder or a cluster builder, not both"))]
    AmbiguousBuilder,

    #[snafu(display("env var {name:?} can not be deleted because it does not exist"))]
    EnvDeleteNotFound { name: String },

    #[snafu(display("env var {name:?} can not be both set and deleted"))]
    DuplicateEnvOp { name: String },

    #[snafu(display("additional tag {tag:?} can not be deleted because it does not exist"))]
    TagDeleteNotFound { tag: String },

    #[snafu(display("additional tag {tag:?} can not be both added and deleted"))]
    DuplicateTagOp { tag: String },

    #[snafu(display("invalid cache size {input:?}, must be a positive quantity such as 2G"))]
    InvalidCacheSize { input: String },

    #[snafu(display("cache size cannot be decreased, current: {current}, requested: {requested}"))]
    CacheSizeDecreaseRejected { current: String, requested: String },

    #[snafu(display("{field} is required"))]
    MissingRequiredField { field: String },

    #[snafu(display("image source is required, use one of git, blob or local-path"))]
    MissingSource,
}

/// The resolved changes to apply to an image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImagePlan {
    pub source: SourceChange,
    pub builder: BuilderChange,
    pub cache_size: Option<K8sQuantity>,
}

/// Checks `descriptor` against the `existing` image spec and resolves it into an [`ImagePlan`].
pub fn validate(
    descriptor: &ImageDescriptor,
    existing: Option<&ImageSpec>,
    defaults: &Defaults,
) -> Result<ImagePlan, ValidationError> {
    let source = select_source(descriptor, existing.map(|spec| &spec.source), defaults)?;
    let builder = select_builder(descriptor)?;

    let existing_env = existing.map(ImageSpec::env).unwrap_or_default();
    for name in &descriptor.env_delete {
        if !merge::contains_key(existing_env, name) {
            return EnvDeleteNotFoundSnafu { name }.fail();
        }
    }
    for assignment in &descriptor.env_set {
        if descriptor.env_delete.contains(&assignment.name) {
            return DuplicateEnvOpSnafu {
                name: &assignment.name,
            }
            .fail();
        }
    }

    let existing_tags = existing
        .map(|spec| spec.additional_tags.as_slice())
        .unwrap_or_default();
    for tag in &descriptor.additional_tags_delete {
        if !merge::contains_key(existing_tags, tag) {
            return TagDeleteNotFoundSnafu { tag }.fail();
        }
    }
    for tag in &descriptor.additional_tags_set {
        if descriptor.additional_tags_delete.contains(tag) {
            return DuplicateTagOpSnafu { tag }.fail();
        }
    }

    let cache_size = match descriptor.cache_size() {
        Some(input) => Some(validate_cache_size(input, existing.and_then(ImageSpec::cache_size))?),
        None => None,
    };

    Ok(ImagePlan {
        source,
        builder,
        cache_size,
    })
}

/// Like [`validate`], for an image that does not exist yet: a tag and a source are required.
pub fn validate_new(
    descriptor: &ImageDescriptor,
    defaults: &Defaults,
) -> Result<ImagePlan, ValidationError> {
    if descriptor.tag().is_none() {
        return MissingRequiredFieldSnafu { field: "tag" }.fail();
    }

    let plan = validate(descriptor, None, defaults)?;
    if plan.source == SourceChange::Unchanged {
        return MissingSourceSnafu.fail();
    }

    Ok(plan)
}

/// A cache volume can only grow. An existing size that does not parse is not compared.
fn validate_cache_size(
    input: &str,
    current: Option<&K8sQuantity>,
) -> Result<K8sQuantity, ValidationError> {
    let requested = Quantity::from_str(input)
        .ok()
        .filter(Quantity::is_positive)
        .ok_or_else(|| ValidationError::InvalidCacheSize {
            input: input.to_owned(),
        })?;

    if let Some(current) = current
        && let Ok(current_size) = Quantity::try_from(current)
        && requested < current_size
    {
        return CacheSizeDecreaseRejectedSnafu {
            current: &current.0,
            requested: input,
        }
        .fail();
    }

    Ok(K8sQuantity(input.to_owned()))
}
