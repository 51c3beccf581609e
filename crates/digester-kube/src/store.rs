//! Pull secret lookup through the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use kube::Client;
use kube::api::Api;

use digester_core::{CredentialStore, DigesterError, DockerConfig};

use crate::error::KubeError;

/// Secret type holding a `config.json` style document
pub const DOCKER_CONFIG_JSON_TYPE: &str = "kubernetes.io/dockerconfigjson";

/// Secret type holding a legacy `.dockercfg` document
pub const DOCKERCFG_TYPE: &str = "kubernetes.io/dockercfg";

const DOCKER_CONFIG_JSON_KEY: &str = ".dockerconfigjson";
const DOCKERCFG_KEY: &str = ".dockercfg";

/// [`CredentialStore`] backed by a cluster
///
/// Needs `get` on `serviceaccounts` and `secrets` in the workload namespaces.
#[derive(Clone)]
pub struct KubeCredentialStore {
    client: Client,
}

impl KubeCredentialStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CredentialStore for KubeCredentialStore {
    async fn pull_secrets_for(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> digester_core::Result<Vec<String>> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let account = api
            .get_opt(service_account)
            .await
            .map_err(|e| api_error("service account", namespace, service_account, e))?;

        match account {
            Some(account) => Ok(pull_secret_names(&account)),
            None => {
                tracing::warn!(
                    namespace,
                    service_account,
                    "service account not found, using workload pull secrets only"
                );
                Ok(Vec::new())
            }
        }
    }

    async fn docker_config(
        &self,
        namespace: &str,
        secret: &str,
    ) -> digester_core::Result<Option<DockerConfig>> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let found = api
            .get_opt(secret)
            .await
            .map_err(|e| api_error("secret", namespace, secret, e))?;

        match found {
            Some(found) => docker_config_from_secret(namespace, secret, &found)
                .map(Some)
                .map_err(|e| DigesterError::credential(e.to_string())),
            None => Ok(None),
        }
    }
}

fn api_error(what: &str, namespace: &str, name: &str, err: kube::Error) -> DigesterError {
    DigesterError::credential(format!(
        "could not get {} {}/{}: {}",
        what,
        namespace,
        name,
        KubeError::from(err)
    ))
}

/// Names of the pull secrets attached to a service account
pub fn pull_secret_names(account: &ServiceAccount) -> Vec<String> {
    account
        .image_pull_secrets
        .iter()
        .flatten()
        .map(|reference| reference.name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Parse the registry credentials held by a pull secret
///
/// Secrets of other types hold no registry credentials and yield an empty
/// config.
pub fn docker_config_from_secret(
    namespace: &str,
    name: &str,
    secret: &Secret,
) -> Result<DockerConfig, KubeError> {
    let invalid = |message: String| KubeError::InvalidSecret {
        namespace: namespace.to_string(),
        name: name.to_string(),
        message,
    };
    let data = |key: &str| {
        secret
            .data
            .as_ref()
            .and_then(|data| data.get(key))
            .map(|bytes| bytes.0.as_slice())
            .ok_or_else(|| invalid(format!("missing {} key", key)))
    };

    match secret.type_.as_deref() {
        Some(DOCKER_CONFIG_JSON_TYPE) => DockerConfig::from_config_json(data(DOCKER_CONFIG_JSON_KEY)?)
            .map_err(|e| invalid(e.to_string())),
        Some(DOCKERCFG_TYPE) => {
            DockerConfig::from_dockercfg(data(DOCKERCFG_KEY)?).map_err(|e| invalid(e.to_string()))
        }
        other => {
            tracing::warn!(
                namespace,
                secret = name,
                secret_type = other.unwrap_or_default(),
                "secret is not a docker registry secret, ignoring"
            );
            Ok(DockerConfig::default())
        }
    }
}
