use std::path::{Path, PathBuf};

use k8s_openapi::api::core::v1::EnvVar;
use kube::{Resource, ResourceExt};
use snafu::{ResultExt as _, Snafu, ensure};

use crate::{
    config::Defaults,
    crd::{BuilderKind, BuilderReference, Image, ImageBuild, ImageSpec, Registry, Source},
    image::{
        ImageDescriptor,
        source::SourceChange,
        validation::{self, ImagePlan, ValidationError},
    },
    merge,
    patch::{self, Patch},
    upload::{self, SourceUploader, default_destination},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(transparent)]
    Validation { source: ValidationError },

    #[snafu(display("local path {path:?} does not exist or is not a directory"))]
    LocalPathNotFound { path: PathBuf },

    #[snafu(display("failed to upload local source code"))]
    UploadSource { source: upload::Error },

    #[snafu(display("failed to compute patch for Image {name:?}"))]
    ComputePatch { source: patch::Error, name: String },
}

/// Builds new images and mutated copies of existing ones from an [`ImageDescriptor`].
pub struct ImageFactory<'a> {
    defaults: &'a Defaults,
    uploader: &'a dyn SourceUploader,
}

impl<'a> ImageFactory<'a> {
    pub fn new(defaults: &'a Defaults, uploader: &'a dyn SourceUploader) -> Self {
        Self { defaults, uploader }
    }

    /// Creates a new image named `name` in `namespace`.
    ///
    /// Requires a tag and a source. Without a builder the default ClusterBuilder is used.
    pub async fn make_image(
        &self,
        name: &str,
        namespace: &str,
        descriptor: &ImageDescriptor,
    ) -> Result<Image, Error> {
        let plan = validation::validate_new(descriptor, self.defaults)?;

        let mut image = Image::new(
            name,
            ImageSpec {
                builder: BuilderReference {
                    kind: BuilderKind::ClusterBuilder,
                    name: self.defaults.cluster_builder.clone(),
                    namespace: None,
                },
                service_account_name: Some(self.defaults.service_account.clone()),
                ..ImageSpec::default()
            },
        );
        image.meta_mut().namespace = Some(namespace.to_owned());

        self.apply_plan(&mut image, descriptor, plan).await?;
        Ok(image)
    }

    /// Returns a copy of `existing` with the changes of `descriptor` applied.
    pub async fn update_image(
        &self,
        existing: &Image,
        descriptor: &ImageDescriptor,
    ) -> Result<Image, Error> {
        let plan = validation::validate(descriptor, Some(&existing.spec), self.defaults)?;

        let mut image = existing.clone();
        self.apply_plan(&mut image, descriptor, plan).await?;
        Ok(image)
    }

    /// Like [`Self::update_image`], also returning the patch from `existing` to the result.
    pub async fn make_patch(
        &self,
        existing: &Image,
        descriptor: &ImageDescriptor,
    ) -> Result<(Image, Patch), Error> {
        let updated = self.update_image(existing, descriptor).await?;
        let patch = patch::diff_resources(existing, &updated).with_context(|_| {
            ComputePatchSnafu {
                name: existing.name_any(),
            }
        })?;

        tracing::debug!(
            name = %existing.name_any(),
            operations = patch.len(),
            "computed image patch"
        );
        Ok((updated, patch))
    }

    async fn apply_plan(
        &self,
        image: &mut Image,
        descriptor: &ImageDescriptor,
        plan: ImagePlan,
    ) -> Result<(), Error> {
        if let Some(tag) = descriptor.tag() {
            tag.clone_into(&mut image.spec.tag);
        }

        let source = match plan.source {
            SourceChange::Unchanged => None,
            SourceChange::Git(git) => Some(Source::Git(git)),
            SourceChange::Blob(blob) => Some(Source::Blob(blob)),
            SourceChange::LocalPath { path, destination } => {
                let destination =
                    destination.unwrap_or_else(|| default_destination(&image.spec.tag));
                let uploaded = self.upload(&path, &destination).await?;
                Some(Source::Registry(Registry { image: uploaded }))
            }
        };
        if let Some(source) = source {
            image.spec.source.set_source(source);
        }

        if let Some(sub_path) = &descriptor.sub_path {
            image.spec.source.sub_path = (!sub_path.is_empty()).then(|| sub_path.clone());
        }

        let namespace = image.namespace().unwrap_or_default();
        if let Some(builder) = plan.builder.into_reference(&namespace) {
            image.spec.builder = builder;
        }

        apply_env(&mut image.spec, descriptor);

        for tag in &descriptor.additional_tags_delete {
            merge::remove(&mut image.spec.additional_tags, tag);
        }
        for tag in &descriptor.additional_tags_set {
            merge::upsert(&mut image.spec.additional_tags, tag.clone());
        }

        if let Some(cache_size) = plan.cache_size {
            image.spec.set_cache_size(cache_size);
        }

        if let Some(service_account) = descriptor.service_account() {
            image.spec.service_account_name = Some(service_account.to_owned());
        }

        Ok(())
    }

    async fn upload(&self, path: &Path, destination: &str) -> Result<String, Error> {
        let is_dir = tokio::fs::metadata(path)
            .await
            .is_ok_and(|metadata| metadata.is_dir());
        ensure!(is_dir, LocalPathNotFoundSnafu { path });

        tracing::info!(path = %path.display(), destination, "uploading local source code");
        self.uploader
            .upload(destination, path)
            .await
            .context(UploadSourceSnafu)
    }
}

/// Deletes, then sets env vars. A `build` section is only added when there is something in it.
fn apply_env(spec: &mut ImageSpec, descriptor: &ImageDescriptor) {
    let had_build = spec.build.is_some();
    let build = spec.build.get_or_insert_with(ImageBuild::default);

    for name in &descriptor.env_delete {
        merge::remove(&mut build.env, name);
    }
    for assignment in &descriptor.env_set {
        merge::upsert(
            &mut build.env,
            EnvVar {
                name: assignment.name.clone(),
                value: Some(assignment.value.clone()),
                ..EnvVar::default()
            },
        );
    }

    if !had_build && build.is_empty() {
        spec.build = None;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use indoc::indoc;
    use serde_json::json;

    use super::*;
    use crate::{
        crd::{Blob, Git},
        image::EnvAssignment,
        patch::Operation,
        upload::UnavailableUploader,
    };

    /// Records uploads and answers with a fixed digest.
    #[derive(Default)]
    struct RecordingUploader {
        uploads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceUploader for RecordingUploader {
        async fn upload(&self, destination: &str, _path: &Path) -> Result<String, upload::Error> {
            self.uploads
                .lock()
                .expect("lock is not poisoned")
                .push(destination.to_owned());
            Ok(format!("{destination}@sha256:abcd"))
        }
    }

    fn existing() -> Image {
        serde_yaml::from_str(indoc! {"
            apiVersion: kpack.io/v1alpha2
            kind: Image
            metadata:
              name: petclinic
              namespace: apps
              resourceVersion: \"7\"
            spec:
              tag: registry.example.com/apps/petclinic
              additionalTags:
              - t1
              builder:
                kind: ClusterBuilder
                name: default
              serviceAccountName: default
              source:
                blob:
                  url: https://example.com/old.tgz
              build:
                env:
                - name: foo
                  value: \"\"
        "})
        .expect("test YAML is valid")
    }

    fn descriptor() -> ImageDescriptor {
        ImageDescriptor::default()
    }

    #[tokio::test]
    async fn blob_to_git_patch() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            git_repo: Some("g".to_owned()),
            ..descriptor()
        };

        let (updated, patch) = factory
            .make_patch(&existing(), &descriptor)
            .await
            .expect("patch is valid");

        assert_eq!(
            updated.spec.source.git,
            Some(Git {
                url: "g".to_owned(),
                revision: "main".to_owned(),
            })
        );
        assert_eq!(updated.spec.source.blob, None);
        assert_eq!(
            patch.operations(),
            [
                Operation::Remove {
                    path: "/spec/source/blob".to_owned(),
                },
                Operation::Add {
                    path: "/spec/source/git".to_owned(),
                    value: json!({"url": "g", "revision": "main"}),
                },
            ]
        );
    }

    #[tokio::test]
    async fn env_is_appended_with_a_single_add() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            env_set: vec![EnvAssignment {
                name: "bar".to_owned(),
                value: "baz".to_owned(),
            }],
            ..descriptor()
        };

        let (updated, patch) = factory
            .make_patch(&existing(), &descriptor)
            .await
            .expect("patch is valid");

        let names: Vec<_> = updated.spec.env().iter().map(|env| env.name.as_str()).collect();
        assert_eq!(names, ["foo", "bar"]);
        assert_eq!(
            patch.operations(),
            [Operation::Add {
                path: "/spec/build/env/1".to_owned(),
                value: json!({"name": "bar", "value": "baz"}),
            }]
        );
    }

    #[tokio::test]
    async fn re_adding_a_tag_changes_nothing() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            additional_tags_set: vec!["t1".to_owned()],
            ..descriptor()
        };

        let (_, patch) = factory
            .make_patch(&existing(), &descriptor)
            .await
            .expect("patch is valid");

        assert!(patch.is_empty());
    }

    #[tokio::test]
    async fn empty_descriptor_changes_nothing() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);

        let (updated, patch) = factory
            .make_patch(&existing(), &descriptor())
            .await
            .expect("patch is valid");

        assert!(patch.is_empty());
        assert_eq!(updated, existing());
    }

    #[tokio::test]
    async fn deleting_the_last_env_var_keeps_the_build_section() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            env_delete: vec!["foo".to_owned()],
            ..descriptor()
        };

        let updated = factory
            .update_image(&existing(), &descriptor)
            .await
            .expect("update is valid");

        assert_eq!(updated.spec.build, Some(ImageBuild::default()));
    }

    #[tokio::test]
    async fn empty_sub_path_clears_it() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let mut image = existing();
        image.spec.source.sub_path = Some("api".to_owned());

        let updated = factory
            .update_image(
                &image,
                &ImageDescriptor {
                    sub_path: Some(String::new()),
                    ..descriptor()
                },
            )
            .await
            .expect("update is valid");

        assert_eq!(updated.spec.source.sub_path, None);
    }

    #[tokio::test]
    async fn new_image_uses_defaults() {
        let defaults = Defaults {
            cluster_builder: "base".to_owned(),
            ..Defaults::default()
        };
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            tag: Some("registry.example.com/apps/new".to_owned()),
            blob_url: Some("https://example.com/app.tgz".to_owned()),
            env_set: vec![EnvAssignment {
                name: "BP_JVM_VERSION".to_owned(),
                value: "17".to_owned(),
            }],
            ..descriptor()
        };

        let image = factory
            .make_image("new", "apps", &descriptor)
            .await
            .expect("image is valid");

        assert_eq!(image.namespace().as_deref(), Some("apps"));
        assert_eq!(image.spec.builder.kind, BuilderKind::ClusterBuilder);
        assert_eq!(image.spec.builder.name, "base");
        assert_eq!(image.spec.service_account_name.as_deref(), Some("default"));
        assert_eq!(
            image.spec.source.blob,
            Some(Blob {
                url: "https://example.com/app.tgz".to_owned()
            })
        );
        assert_eq!(image.spec.env().len(), 1);
    }

    #[tokio::test]
    async fn new_image_without_env_has_no_build_section() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);
        let descriptor = ImageDescriptor {
            tag: Some("registry.example.com/apps/new".to_owned()),
            git_repo: Some("https://example.com/app.git".to_owned()),
            ..descriptor()
        };

        let image = factory
            .make_image("new", "apps", &descriptor)
            .await
            .expect("image is valid");

        assert_eq!(image.spec.build, None);
    }

    #[tokio::test]
    async fn namespaced_builder_gets_image_namespace() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);

        let updated = factory
            .update_image(
                &existing(),
                &ImageDescriptor {
                    builder: Some("team-builder".to_owned()),
                    ..descriptor()
                },
            )
            .await
            .expect("update is valid");

        assert_eq!(
            updated.spec.builder,
            BuilderReference {
                kind: BuilderKind::Builder,
                name: "team-builder".to_owned(),
                namespace: Some("apps".to_owned()),
            }
        );
    }

    #[tokio::test]
    async fn local_path_is_uploaded_next_to_tag() {
        let defaults = Defaults::default();
        let uploader = RecordingUploader::default();
        let factory = ImageFactory::new(&defaults, &uploader);
        let directory = tempfile::tempdir().expect("temporary directory is created");

        let updated = factory
            .update_image(
                &existing(),
                &ImageDescriptor {
                    local_path: Some(directory.path().to_owned()),
                    ..descriptor()
                },
            )
            .await
            .expect("update is valid");

        assert_eq!(
            updated.spec.source.registry,
            Some(Registry {
                image: "registry.example.com/apps/petclinic-source@sha256:abcd".to_owned()
            })
        );
        assert_eq!(updated.spec.source.blob, None);
    }

    #[tokio::test]
    async fn missing_local_path_fails_before_upload() {
        let defaults = Defaults::default();
        let uploader = RecordingUploader::default();
        let factory = ImageFactory::new(&defaults, &uploader);

        let error = factory
            .update_image(
                &existing(),
                &ImageDescriptor {
                    local_path: Some(PathBuf::from("/does/not/exist")),
                    ..descriptor()
                },
            )
            .await
            .expect_err("path does not exist");

        assert!(matches!(error, Error::LocalPathNotFound { .. }));
        assert!(uploader.uploads.lock().expect("lock is not poisoned").is_empty());
    }

    #[tokio::test]
    async fn validation_errors_pass_through() {
        let defaults = Defaults::default();
        let factory = ImageFactory::new(&defaults, &UnavailableUploader);

        let error = factory
            .make_patch(
                &existing(),
                &ImageDescriptor {
                    git_repo: Some("g".to_owned()),
                    blob_url: Some("b".to_owned()),
                    ..descriptor()
                },
            )
            .await
            .expect_err("two sources are ambiguous");

        assert!(matches!(
            error,
            Error::Validation {
                source: ValidationError::AmbiguousSource
            }
        ));
    }
}
