//! Turning `kp image` flags into an [`Image`](crate::crd::Image) and patches of it.
//!
//! The flow is: an [`ImageDescriptor`] is checked by [`validation::validate`] against the existing
//! image (if any), which resolves it into an [`validation::ImagePlan`]. The
//! [`factory::ImageFactory`] applies that plan to a copy of the image, and [`save`] sends the
//! difference to the cluster.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use snafu::{OptionExt as _, Snafu};

pub mod builder;
pub mod factory;
pub mod save;
pub mod source;
pub mod validation;

pub use factory::ImageFactory;
pub use validation::{ImagePlan, ValidationError};

/// The desired changes to an image, as given on the command line.
///
/// Empty strings count as not given, except for `sub_path` where an empty string clears the sub
/// path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub tag: Option<String>,

    pub git_repo: Option<String>,
    pub git_revision: Option<String>,
    pub blob_url: Option<String>,
    pub local_path: Option<PathBuf>,
    pub local_path_destination_image: Option<String>,
    pub sub_path: Option<String>,

    pub builder: Option<String>,
    pub cluster_builder: Option<String>,

    /// Env vars to add or overwrite, in order.
    pub env_set: Vec<EnvAssignment>,
    pub env_delete: Vec<String>,

    pub additional_tags_set: Vec<String>,
    pub additional_tags_delete: Vec<String>,

    pub cache_size: Option<String>,
    pub service_account: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

impl ImageDescriptor {
    pub fn tag(&self) -> Option<&str> {
        non_empty(self.tag.as_deref())
    }

    pub fn git_repo(&self) -> Option<&str> {
        non_empty(self.git_repo.as_deref())
    }

    pub fn git_revision(&self) -> Option<&str> {
        non_empty(self.git_revision.as_deref())
    }

    pub fn blob_url(&self) -> Option<&str> {
        non_empty(self.blob_url.as_deref())
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn local_path_destination_image(&self) -> Option<&str> {
        non_empty(self.local_path_destination_image.as_deref())
    }

    pub fn builder(&self) -> Option<&str> {
        non_empty(self.builder.as_deref())
    }

    pub fn cluster_builder(&self) -> Option<&str> {
        non_empty(self.cluster_builder.as_deref())
    }

    pub fn cache_size(&self) -> Option<&str> {
        non_empty(self.cache_size.as_deref())
    }

    pub fn service_account(&self) -> Option<&str> {
        non_empty(self.service_account.as_deref())
    }
}

#[derive(Debug, PartialEq, Eq, Snafu)]
#[snafu(display("invalid env var {input:?}, expected the format KEY=VALUE"))]
pub struct ParseEnvAssignmentError {
    input: String,
}

/// A `KEY=VALUE` pair from `--env`. The value may be empty and may contain `=`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvAssignment {
    pub name: String,
    pub value: String,
}

impl FromStr for EnvAssignment {
    type Err = ParseEnvAssignmentError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (name, value) = input
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .context(ParseEnvAssignmentSnafu { input })?;

        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}
