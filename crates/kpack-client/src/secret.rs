//! Registry and git credentials for kpack, stored as secrets and linked to a service account.

use std::collections::BTreeMap;

use base64::Engine as _;
use k8s_openapi::{
    ByteString,
    api::core::v1::{LocalObjectReference, ObjectReference, Secret, ServiceAccount},
};
use kube::{Resource, ResourceExt};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt as _, ResultExt as _, Snafu, ensure};

use crate::{
    client::{self, ResourceClient},
    merge,
    save::{self, apply_patch},
};

/// Annotation holding the git server a git secret authenticates against.
pub const GIT_ANNOTATION: &str = "kpack.io/git";

/// The key Docker Hub credentials are stored under in a docker config.
pub const DOCKER_HUB_URL: &str = "https://index.docker.io/v1/";

pub const DOCKER_PASSWORD_ENV: &str = "DOCKER_PASSWORD";
pub const REGISTRY_PASSWORD_ENV: &str = "REGISTRY_PASSWORD";
pub const GIT_PASSWORD_ENV: &str = "GIT_PASSWORD";

const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";
const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
const BASIC_AUTH_TYPE: &str = "kubernetes.io/basic-auth";
const SSH_AUTH_TYPE: &str = "kubernetes.io/ssh-auth";
const SSH_PRIVATE_KEY_KEY: &str = "ssh-privatekey";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("secret must be exactly one of dockerhub, registry or git"))]
    AmbiguousSecretType,

    #[snafu(display("secret type is required, use one of dockerhub, registry or git"))]
    MissingSecretType,

    #[snafu(display("{field} is required"))]
    MissingRequiredField { field: String },

    #[snafu(display("password must be set in the {variable} environment variable"))]
    MissingPassword { variable: String },

    #[snafu(display("failed to serialize docker config"))]
    SerializeDockerConfig { source: serde_json::Error },

    #[snafu(transparent)]
    Save { source: save::Error },

    #[snafu(transparent)]
    Client { source: client::Error },
}

/// The credentials requested on the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecretDescriptor {
    pub dockerhub: Option<String>,
    pub registry: Option<String>,
    pub registry_user: Option<String>,
    pub git_url: Option<String>,
    pub git_user: Option<String>,
    /// Contents of the private key file.
    pub git_ssh_key: Option<String>,
}

/// Exactly one kind of credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SecretKind {
    DockerHub { username: String },
    Registry { url: String, username: String },
    GitBasicAuth { url: String, username: String },
    GitSsh { url: String, private_key: String },
}

impl SecretDescriptor {
    pub fn kind(&self) -> Result<SecretKind, Error> {
        let given = |value: &Option<String>| value.clone().filter(|value| !value.is_empty());
        let (dockerhub, registry, git_url) =
            (given(&self.dockerhub), given(&self.registry), given(&self.git_url));

        let requested = [dockerhub.is_some(), registry.is_some(), git_url.is_some()]
            .into_iter()
            .filter(|requested| *requested)
            .count();
        ensure!(requested <= 1, AmbiguousSecretTypeSnafu);

        if let Some(username) = dockerhub {
            return Ok(SecretKind::DockerHub { username });
        }

        if let Some(url) = registry {
            let username = given(&self.registry_user)
                .context(MissingRequiredFieldSnafu { field: "registry-user" })?;
            return Ok(SecretKind::Registry { url, username });
        }

        let url = git_url.context(MissingSecretTypeSnafu)?;
        match (given(&self.git_user), given(&self.git_ssh_key)) {
            (Some(username), None) => Ok(SecretKind::GitBasicAuth { url, username }),
            (None, Some(private_key)) => Ok(SecretKind::GitSsh { url, private_key }),
            (Some(_), Some(_)) => AmbiguousSecretTypeSnafu.fail(),
            (None, None) => MissingRequiredFieldSnafu {
                field: "git-user or git-ssh-key",
            }
            .fail(),
        }
    }
}

impl SecretKind {
    /// The environment variable the password is read from, if this kind needs one.
    pub fn password_variable(&self) -> Option<&'static str> {
        match self {
            Self::DockerHub { .. } => Some(DOCKER_PASSWORD_ENV),
            Self::Registry { .. } => Some(REGISTRY_PASSWORD_ENV),
            Self::GitBasicAuth { .. } => Some(GIT_PASSWORD_ENV),
            Self::GitSsh { .. } => None,
        }
    }

    /// Registry credentials are also used to pull images.
    pub fn is_registry(&self) -> bool {
        matches!(self, Self::DockerHub { .. } | Self::Registry { .. })
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct DockerConfig {
    auths: BTreeMap<String, DockerAuth>,
}

#[derive(Debug, Deserialize, Serialize)]
struct DockerAuth {
    username: String,
    password: String,
    auth: String,
}

/// Builds the secret for `kind`.
///
/// `lookup_password` reads the environment variable named by [`SecretKind::password_variable`].
pub fn make_secret(
    name: &str,
    namespace: &str,
    kind: &SecretKind,
    lookup_password: impl Fn(&str) -> Option<String>,
) -> Result<Secret, Error> {
    let password = match kind.password_variable() {
        Some(variable) => lookup_password(variable)
            .filter(|password| !password.is_empty())
            .context(MissingPasswordSnafu { variable })?,
        None => String::new(),
    };

    let mut secret = Secret::default();
    secret.meta_mut().name = Some(name.to_owned());
    secret.meta_mut().namespace = Some(namespace.to_owned());

    let (type_, data) = match kind {
        SecretKind::DockerHub { username } => (
            DOCKER_CONFIG_JSON_TYPE,
            docker_config_data(DOCKER_HUB_URL, username, password)?,
        ),
        SecretKind::Registry { url, username } => (
            DOCKER_CONFIG_JSON_TYPE,
            docker_config_data(url, username, password)?,
        ),
        SecretKind::GitBasicAuth { url, username } => {
            secret
                .annotations_mut()
                .insert(GIT_ANNOTATION.to_owned(), url.clone());
            (
                BASIC_AUTH_TYPE,
                BTreeMap::from([
                    ("username".to_owned(), ByteString(username.clone().into_bytes())),
                    ("password".to_owned(), ByteString(password.into_bytes())),
                ]),
            )
        }
        SecretKind::GitSsh { url, private_key } => {
            secret
                .annotations_mut()
                .insert(GIT_ANNOTATION.to_owned(), url.clone());
            (
                SSH_AUTH_TYPE,
                BTreeMap::from([(
                    SSH_PRIVATE_KEY_KEY.to_owned(),
                    ByteString(private_key.clone().into_bytes()),
                )]),
            )
        }
    };

    secret.type_ = Some(type_.to_owned());
    secret.data = Some(data);
    Ok(secret)
}

fn docker_config_data(
    url: &str,
    username: &str,
    password: String,
) -> Result<BTreeMap<String, ByteString>, Error> {
    let auth = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    let config = DockerConfig {
        auths: BTreeMap::from([(
            url.to_owned(),
            DockerAuth {
                username: username.to_owned(),
                password,
                auth,
            },
        )]),
    };

    let json = serde_json::to_vec(&config).context(SerializeDockerConfigSnafu)?;
    Ok(BTreeMap::from([(DOCKER_CONFIG_JSON_KEY.to_owned(), ByteString(json))]))
}

/// What the secret grants access to: a git server or registries. `None` for unrelated secrets.
pub fn secret_target(secret: &Secret) -> Option<String> {
    if let Some(url) = secret.annotations().get(GIT_ANNOTATION) {
        return Some(url.clone());
    }

    if secret.type_.as_deref() != Some(DOCKER_CONFIG_JSON_TYPE) {
        return None;
    }

    let data = secret.data.as_ref()?.get(DOCKER_CONFIG_JSON_KEY)?;
    let config: DockerConfig = serde_json::from_slice(&data.0).ok()?;
    Some(config.auths.into_keys().collect::<Vec<_>>().join(", "))
}

/// Whether this secret holds credentials `kp` manages.
pub fn is_managed(secret: &Secret) -> bool {
    secret_target(secret).is_some()
}

/// Returns a copy of `account` that references secret `name`.
pub fn link(account: &ServiceAccount, name: &str, registry: bool) -> ServiceAccount {
    let mut account = account.clone();

    merge::upsert(
        account.secrets.get_or_insert_with(Vec::new),
        ObjectReference {
            name: Some(name.to_owned()),
            ..ObjectReference::default()
        },
    );
    if registry {
        merge::upsert(
            account.image_pull_secrets.get_or_insert_with(Vec::new),
            LocalObjectReference {
                name: name.to_owned(),
            },
        );
    }

    account
}

/// Returns a copy of `account` without any reference to secret `name`.
pub fn unlink(account: &ServiceAccount, name: &str) -> ServiceAccount {
    let mut account = account.clone();

    if let Some(secrets) = &mut account.secrets {
        merge::remove(secrets, name);
        if secrets.is_empty() {
            account.secrets = None;
        }
    }
    if let Some(pull_secrets) = &mut account.image_pull_secrets {
        merge::remove(pull_secrets, name);
        if pull_secrets.is_empty() {
            account.image_pull_secrets = None;
        }
    }

    account
}

/// Creates `secret` and links it to `service_account` in the same namespace.
///
/// If the link cannot be saved, the created secret is deleted again.
pub async fn create_secret<S, A>(
    secrets: &S,
    accounts: &A,
    secret: &Secret,
    registry: bool,
    service_account: &str,
    conflict_check: bool,
) -> Result<Secret, Error>
where
    S: ResourceClient<Secret> + ?Sized,
    A: ResourceClient<ServiceAccount> + ?Sized,
{
    let namespace = secret.namespace().unwrap_or_default();
    let account = accounts.get(service_account, &namespace).await?;

    let created = secrets.create(secret).await?;
    let linked = link(&account, &created.name_any(), registry);
    if let Err(error) = apply_patch(accounts, &account, linked, conflict_check).await {
        if let Err(delete_error) = secrets.delete(&created.name_any(), &namespace).await {
            tracing::warn!(
                error = &delete_error as &dyn std::error::Error,
                secret = %created.name_any(),
                %namespace,
                "failed to delete unlinked secret"
            );
        }
        return Err(error.into());
    }

    tracing::info!(
        secret = %created.name_any(),
        service_account,
        %namespace,
        "created and linked secret"
    );
    Ok(created)
}

/// Unlinks secret `name` from `service_account` and deletes it.
pub async fn delete_secret<S, A>(
    secrets: &S,
    accounts: &A,
    name: &str,
    namespace: &str,
    service_account: &str,
    conflict_check: bool,
) -> Result<(), Error>
where
    S: ResourceClient<Secret> + ?Sized,
    A: ResourceClient<ServiceAccount> + ?Sized,
{
    if let Some(account) = accounts.get_opt(service_account, namespace).await? {
        let unlinked = unlink(&account, name);
        apply_patch(accounts, &account, unlinked, conflict_check).await?;
    }

    secrets.delete(name, namespace).await?;
    tracing::info!(secret = name, namespace, "deleted secret");
    Ok(())
}
