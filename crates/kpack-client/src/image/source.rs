use std::path::PathBuf;

use crate::{
    config::Defaults,
    crd::{Blob, Git, SourceConfig},
    image::{ImageDescriptor, validation::ValidationError},
};

/// How the source of an image changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceChange {
    /// Keep whatever source the image has.
    Unchanged,
    Git(Git),
    Blob(Blob),
    /// Upload a local directory and build from the pushed image.
    LocalPath {
        path: PathBuf,
        /// Where to push the source image. Derived from the image tag when not given.
        destination: Option<String>,
    },
}

/// Resolves the requested source kind.
///
/// At most one of git repository, blob URL and local path may be given. A git revision alone
/// changes the revision of an existing git source.
pub fn select_source(
    descriptor: &ImageDescriptor,
    existing: Option<&SourceConfig>,
    defaults: &Defaults,
) -> Result<SourceChange, ValidationError> {
    let git_repo = descriptor.git_repo();
    let blob_url = descriptor.blob_url();
    let local_path = descriptor.local_path();

    let requested = [git_repo.is_some(), blob_url.is_some(), local_path.is_some()]
        .into_iter()
        .filter(|requested| *requested)
        .count();
    if requested > 1 {
        return Err(ValidationError::AmbiguousSource);
    }

    if let Some(revision) = descriptor.git_revision()
        && git_repo.is_none()
    {
        return match existing.and_then(|source| source.git.as_ref()) {
            Some(git) if requested == 0 => Ok(SourceChange::Git(Git {
                url: git.url.clone(),
                revision: revision.to_owned(),
            })),
            _ => Err(ValidationError::IncompatibleGitRevision),
        };
    }

    if let Some(url) = git_repo {
        let revision = descriptor
            .git_revision()
            .unwrap_or(&defaults.git_revision)
            .to_owned();

        return Ok(SourceChange::Git(Git {
            url: url.to_owned(),
            revision,
        }));
    }

    if let Some(url) = blob_url {
        return Ok(SourceChange::Blob(Blob {
            url: url.to_owned(),
        }));
    }

    if let Some(path) = local_path {
        return Ok(SourceChange::LocalPath {
            path: path.to_owned(),
            destination: descriptor.local_path_destination_image().map(str::to_owned),
        });
    }

    Ok(SourceChange::Unchanged)
}
