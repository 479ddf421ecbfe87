//! Uploading local source code to a registry, so that kpack can build from it.

use std::path::Path;

use async_trait::async_trait;
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "uploading local source code to {destination:?} is not supported by this build of kp, use --git or --blob instead"
    ))]
    RegistryUnavailable { destination: String },
}

/// Packs a directory into an image and pushes it to a registry.
#[async_trait]
pub trait SourceUploader: Send + Sync {
    /// Uploads the contents of `path` to `destination` and returns the pushed image reference,
    /// including its digest.
    async fn upload(&self, destination: &str, path: &Path) -> Result<String, Error>;
}

/// The uploader used when no registry client is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableUploader;

#[async_trait]
impl SourceUploader for UnavailableUploader {
    async fn upload(&self, destination: &str, _path: &Path) -> Result<String, Error> {
        RegistryUnavailableSnafu { destination }.fail()
    }
}

/// Derives the default upload destination from the tag of an image: `<repository>-source`.
///
/// The tag or digest of `image_tag` is dropped, a registry port is kept.
pub fn default_destination(image_tag: &str) -> String {
    let last_segment = image_tag.rfind('/').map_or(0, |index| index + 1);

    let repository = match image_tag[last_segment..].find(['@', ':']) {
        Some(index) => &image_tag[..last_segment + index],
        None => image_tag,
    };

    format!("{repository}-source")
}
