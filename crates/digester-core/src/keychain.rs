//! Registry credential chains
//!
//! A [`CredentialChain`] is built once per workload. Online, it starts with
//! the pull secrets the cluster would use for the workload's pods:
//!
//! 1. namespace from `metadata.namespace` (default `default`)
//! 2. service account from `spec.serviceAccountName`, then
//!    `spec.template.spec.serviceAccountName` (default `default`)
//! 3. pull secrets from `spec.imagePullSecrets`, or, only when that is
//!    empty, `spec.template.spec.imagePullSecrets`
//! 4. plus the pull secrets attached to the service account
//!
//! followed by the local Docker config and anonymous access.

use async_trait::async_trait;
use std::fmt;

use crate::docker_config::{DockerConfig, RegistryCredential};
use crate::error::Result;
use crate::tree::WorkloadTree;

/// Namespace assumed when the workload declares none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Service account assumed when the workload declares none
pub const DEFAULT_SERVICE_ACCOUNT: &str = "default";

/// Cluster-side source of pull secrets
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Names of the pull secrets attached to a service account
    ///
    /// A service account that does not exist has no pull secrets.
    async fn pull_secrets_for(&self, namespace: &str, service_account: &str)
    -> Result<Vec<String>>;

    /// Registry credentials held by a pull secret
    ///
    /// Returns `Ok(None)` when the secret does not exist.
    async fn docker_config(&self, namespace: &str, secret: &str) -> Result<Option<DockerConfig>>;
}

/// One link of a [`CredentialChain`]
#[derive(Clone, PartialEq)]
pub enum CredentialProvider {
    /// Pull secrets resolved from the cluster, in precedence order
    Cluster {
        namespace: String,
        secrets: Vec<(String, DockerConfig)>,
    },
    /// Local Docker config (`~/.docker/config.json`)
    DockerConfigFile(DockerConfig),
    /// Always matches, without credentials
    Anonymous,
}

impl CredentialProvider {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CredentialProvider::Cluster { .. } => "cluster",
            CredentialProvider::DockerConfigFile(_) => "docker-config",
            CredentialProvider::Anonymous => "anonymous",
        }
    }

    /// Credential this provider offers for a registry, if any
    pub fn credential_for(&self, registry: &str) -> Option<RegistryCredential> {
        match self {
            CredentialProvider::Cluster { secrets, .. } => secrets
                .iter()
                .find_map(|(_, config)| config.credential_for(registry)),
            CredentialProvider::DockerConfigFile(config) => config.credential_for(registry),
            CredentialProvider::Anonymous => Some(RegistryCredential::Anonymous),
        }
    }
}

impl fmt::Debug for CredentialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialProvider::Cluster { namespace, secrets } => f
                .debug_struct("Cluster")
                .field("namespace", namespace)
                .field(
                    "secrets",
                    &secrets.iter().map(|(name, _)| name).collect::<Vec<_>>(),
                )
                .finish(),
            CredentialProvider::DockerConfigFile(config) => f
                .debug_tuple("DockerConfigFile")
                .field(&config.auths.keys().collect::<Vec<_>>())
                .finish(),
            CredentialProvider::Anonymous => f.write_str("Anonymous"),
        }
    }
}

/// Ordered credential providers, first match wins
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialChain {
    providers: Vec<CredentialProvider>,
}

impl CredentialChain {
    pub fn new(providers: Vec<CredentialProvider>) -> Self {
        Self { providers }
    }

    /// A chain that only knows anonymous access
    pub fn anonymous() -> Self {
        Self::new(vec![CredentialProvider::Anonymous])
    }

    /// Offline chain: local Docker config, then anonymous
    pub fn offline(local: DockerConfig) -> Self {
        Self::new(vec![
            CredentialProvider::DockerConfigFile(local),
            CredentialProvider::Anonymous,
        ])
    }

    pub fn providers(&self) -> &[CredentialProvider] {
        &self.providers
    }

    /// Credential to use for a registry host
    ///
    /// Falls back to anonymous access when no provider matches.
    pub fn credential_for(&self, registry: &str) -> RegistryCredential {
        self.providers
            .iter()
            .find_map(|p| p.credential_for(registry))
            .unwrap_or(RegistryCredential::Anonymous)
    }
}

/// Credential-relevant fields extracted from a workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadCredentials {
    pub namespace: String,
    pub service_account: String,
    pub image_pull_secrets: Vec<String>,
}

impl WorkloadCredentials {
    /// Extract namespace, service account and pull secrets, with fallbacks
    pub fn from_tree(tree: &WorkloadTree) -> Self {
        let namespace = tree.namespace().unwrap_or(DEFAULT_NAMESPACE).to_string();

        let service_account = [
            &["spec", "serviceAccountName"][..],
            &["spec", "template", "spec", "serviceAccountName"][..],
        ]
        .iter()
        .filter_map(|keys| tree.string_at(keys))
        .find(|name| !name.is_empty())
        .unwrap_or(DEFAULT_SERVICE_ACCOUNT)
        .to_string();

        let mut image_pull_secrets = tree.element_values(&["spec", "imagePullSecrets"], "name");
        if image_pull_secrets.is_empty() {
            image_pull_secrets =
                tree.element_values(&["spec", "template", "spec", "imagePullSecrets"], "name");
        }

        Self {
            namespace,
            service_account,
            image_pull_secrets,
        }
    }
}

/// Build the credential chain for a workload
///
/// With no store (offline mode) the chain is `local` followed by anonymous
/// access. Store failures are propagated, never swallowed.
pub async fn create(
    tree: &WorkloadTree,
    store: Option<&dyn CredentialStore>,
    local: DockerConfig,
) -> Result<CredentialChain> {
    let Some(store) = store else {
        tracing::debug!("creating offline keychain");
        return Ok(CredentialChain::offline(local));
    };

    let workload = WorkloadCredentials::from_tree(tree);
    let attached = store
        .pull_secrets_for(&workload.namespace, &workload.service_account)
        .await?;

    let mut names: Vec<String> = Vec::new();
    for name in workload.image_pull_secrets.iter().chain(attached.iter()) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }

    tracing::debug!(
        namespace = %workload.namespace,
        service_account = %workload.service_account,
        image_pull_secrets = ?names,
        "creating cluster keychain"
    );

    let mut secrets = Vec::with_capacity(names.len());
    for name in names {
        match store.docker_config(&workload.namespace, &name).await? {
            Some(config) => secrets.push((name, config)),
            None => tracing::warn!(
                namespace = %workload.namespace,
                secret = %name,
                "image pull secret not found, skipping"
            ),
        }
    }

    Ok(CredentialChain::new(vec![
        CredentialProvider::Cluster {
            namespace: workload.namespace,
            secrets,
        },
        CredentialProvider::DockerConfigFile(local),
        CredentialProvider::Anonymous,
    ]))
}
