//! Access to the Kubernetes API.
//!
//! Commands only talk to the cluster through [`ResourceClient`], which is implemented by the
//! kube-backed [`Client`] and, in tests, by an in-memory fake.

use std::fmt::Debug;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::{
    Api, Config, Resource, ResourceExt,
    api::{DeleteParams, ListParams, Patch as KubePatch, PatchParams, PostParams},
    config::{InferConfigError, KubeConfigOptions, KubeconfigError},
};
use serde::{Serialize, de::DeserializeOwned};
use snafu::{ResultExt as _, Snafu};

use crate::{
    cli::ClusterOptions,
    crd::{Build, Builder, ClusterBuilder, ClusterStack, Image},
    patch::{self, Patch},
};

/// The field manager recorded for every write made by `kp`.
pub const FIELD_MANAGER: &str = "kp";

#[derive(Clone, Copy, Debug, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Verb {
    Get,
    List,
    Create,
    Patch,
    Delete,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load kubeconfig context {context:?}"))]
    LoadKubeconfig {
        source: KubeconfigError,
        context: String,
    },

    #[snafu(display("failed to infer Kubernetes client configuration"))]
    InferConfig { source: InferConfigError },

    #[snafu(display("failed to create Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("{kind} {name:?} not found"))]
    NotFound { kind: String, name: String },

    #[snafu(display("{kind} {name:?} already exists"))]
    AlreadyExists { kind: String, name: String },

    #[snafu(display(
        "{kind} {name:?} was modified by someone else since it was read, run the command again"
    ))]
    Conflict { kind: String, name: String },

    #[snafu(display(
        "not authorized to {verb} {kind} resources, check the credentials in your kubeconfig"
    ))]
    Unauthorized {
        source: kube::Error,
        verb: Verb,
        kind: String,
    },

    #[snafu(display("failed to {verb} {kind} {name:?}"))]
    Request {
        source: kube::Error,
        verb: Verb,
        kind: String,
        name: String,
    },

    #[snafu(display("failed to list {kind} resources"))]
    List { source: kube::Error, kind: String },

    #[snafu(display("failed to convert patch for {kind} {name:?}"))]
    ConvertPatch {
        source: patch::Error,
        kind: String,
        name: String,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// A resource kind `kp` can read and write, together with how to build an [`Api`] for it.
///
/// `kube` only allows namespaced APIs for namespaced kinds, so every kind states its scope here.
pub trait Scoped:
    Resource<DynamicType = ()> + Clone + Debug + DeserializeOwned + Serialize + Send + Sync + 'static
{
    const NAMESPACED: bool;

    /// Returns an API for `namespace`. Cluster-scoped kinds ignore the namespace.
    fn api(client: kube::Client, namespace: &str) -> Api<Self>;

    fn kind_name() -> String {
        Self::kind(&()).into_owned()
    }
}

macro_rules! namespaced {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl Scoped for $kind {
                const NAMESPACED: bool = true;

                fn api(client: kube::Client, namespace: &str) -> Api<Self> {
                    Api::namespaced(client, namespace)
                }
            }
        )+
    };
}

macro_rules! cluster_scoped {
    ($($kind:ty),+ $(,)?) => {
        $(
            impl Scoped for $kind {
                const NAMESPACED: bool = false;

                fn api(client: kube::Client, _namespace: &str) -> Api<Self> {
                    Api::all(client)
                }
            }
        )+
    };
}

namespaced!(Image, Build, Builder, Secret, ServiceAccount);
cluster_scoped!(ClusterBuilder, ClusterStack);

/// CRUD access to resources of kind `K`.
#[async_trait]
pub trait ResourceClient<K: Scoped>: Send + Sync {
    /// Returns `None` if the resource does not exist.
    async fn get_opt(&self, name: &str, namespace: &str) -> Result<Option<K>, Error>;

    async fn list(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<K>, Error>;

    /// Creates `resource` in the namespace of its metadata. Fails with
    /// [`Error::AlreadyExists`] if the name is taken.
    async fn create(&self, resource: &K) -> Result<K, Error>;

    /// Sends `patch` as a JSON Patch for the resource named by `resource`.
    async fn patch(&self, resource: &K, patch: &Patch) -> Result<K, Error>;

    async fn delete(&self, name: &str, namespace: &str) -> Result<(), Error>;

    async fn get(&self, name: &str, namespace: &str) -> Result<K, Error> {
        self.get_opt(name, namespace)
            .await?
            .ok_or_else(|| Error::NotFound {
                kind: K::kind_name(),
                name: name.to_owned(),
            })
    }
}

/// This `Client` can be used to access Kubernetes.
/// It wraps an underlying [`kube::Client`] and remembers the namespace commands default to.
#[derive(Clone)]
pub struct Client {
    client: kube::Client,
    namespace: String,
    post_params: PostParams,
    patch_params: PatchParams,
    delete_params: DeleteParams,
}

impl Client {
    /// Connects using the kubeconfig, or the in-cluster configuration when there is none.
    pub async fn new(options: &ClusterOptions) -> Result<Self, Error> {
        let config = match &options.context {
            Some(context) => Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context.clone()),
                ..KubeConfigOptions::default()
            })
            .await
            .context(LoadKubeconfigSnafu { context })?,
            None => Config::infer().await.context(InferConfigSnafu)?,
        };

        let namespace = options
            .namespace
            .clone()
            .unwrap_or_else(|| config.default_namespace.clone());

        tracing::debug!(
            cluster_url = %config.cluster_url,
            %namespace,
            "connecting to Kubernetes"
        );

        let client = kube::Client::try_from(config).context(CreateClientSnafu)?;
        Ok(Self::from_kube_client(client, namespace))
    }

    pub fn from_kube_client(client: kube::Client, namespace: String) -> Self {
        Self {
            client,
            namespace,
            post_params: PostParams {
                field_manager: Some(FIELD_MANAGER.to_owned()),
                ..PostParams::default()
            },
            patch_params: PatchParams {
                field_manager: Some(FIELD_MANAGER.to_owned()),
                ..PatchParams::default()
            },
            delete_params: DeleteParams::default(),
        }
    }

    /// The namespace commands operate in unless told otherwise.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn api<K: Scoped>(&self, namespace: &str) -> Api<K> {
        K::api(self.client.clone(), namespace)
    }
}

/// Maps API errors with a well-known meaning to dedicated variants.
fn classify<K: Scoped>(source: kube::Error, verb: Verb, name: &str) -> Error {
    let kind = K::kind_name();
    let name = name.to_owned();

    match &source {
        kube::Error::Api(response) if matches!(response.code, 401 | 403) => {
            Error::Unauthorized { source, verb, kind }
        }
        kube::Error::Api(response) if response.code == 404 => Error::NotFound { kind, name },
        kube::Error::Api(response) if response.code == 409 && matches!(verb, Verb::Create) => {
            Error::AlreadyExists { kind, name }
        }
        kube::Error::Api(response)
            if matches!(verb, Verb::Patch)
                && (response.code == 409 || response.message.contains("test failed")) =>
        {
            Error::Conflict { kind, name }
        }
        _ => Error::Request {
            source,
            verb,
            kind,
            name,
        },
    }
}

#[async_trait]
impl<K: Scoped> ResourceClient<K> for Client {
    async fn get_opt(&self, name: &str, namespace: &str) -> Result<Option<K>, Error> {
        tracing::debug!(kind = %K::kind_name(), name, namespace, "getting resource");

        self.api::<K>(namespace)
            .get_opt(name)
            .await
            .map_err(|source| classify::<K>(source, Verb::Get, name))
    }

    async fn list(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<K>, Error> {
        tracing::debug!(kind = %K::kind_name(), namespace, label_selector, "listing resources");

        let mut params = ListParams::default();
        if let Some(label_selector) = label_selector {
            params = params.labels(label_selector);
        }

        match self.api::<K>(namespace).list(&params).await {
            Ok(list) => Ok(list.items),
            Err(source) => match classify::<K>(source, Verb::List, "") {
                Error::Request { source, kind, .. } => Err(Error::List { source, kind }),
                error => Err(error),
            },
        }
    }

    async fn create(&self, resource: &K) -> Result<K, Error> {
        let name = resource.name_any();
        let namespace = resource.namespace().unwrap_or_default();
        tracing::debug!(kind = %K::kind_name(), %name, %namespace, "creating resource");

        self.api::<K>(&namespace)
            .create(&self.post_params, resource)
            .await
            .map_err(|source| classify::<K>(source, Verb::Create, &name))
    }

    async fn patch(&self, resource: &K, patch: &Patch) -> Result<K, Error> {
        let name = resource.name_any();
        let namespace = resource.namespace().unwrap_or_default();
        tracing::debug!(
            kind = %K::kind_name(),
            %name,
            %namespace,
            operations = patch.len(),
            "patching resource"
        );

        let json_patch = patch.to_json_patch().with_context(|_| ConvertPatchSnafu {
            kind: K::kind_name(),
            name: name.clone(),
        })?;

        self.api::<K>(&namespace)
            .patch(&name, &self.patch_params, &KubePatch::Json::<()>(json_patch))
            .await
            .map_err(|source| classify::<K>(source, Verb::Patch, &name))
    }

    async fn delete(&self, name: &str, namespace: &str) -> Result<(), Error> {
        tracing::debug!(kind = %K::kind_name(), name, namespace, "deleting resource");

        self.api::<K>(namespace)
            .delete(name, &self.delete_params)
            .await
            .map(|_| ())
            .map_err(|source| classify::<K>(source, Verb::Delete, name))
    }
}
