//! In-memory capabilities for testing
//!
//! [`MockCredentialStore`] and [`Sha256Resolver`] stand in for the cluster
//! and the registry, so the engine can be exercised without either.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::docker_config::DockerConfig;
use crate::error::{DigesterError, Result};
use crate::keychain::{CredentialChain, CredentialStore};
use crate::resolve::DigestResolver;

/// In-memory credential store
#[derive(Clone, Default)]
pub struct MockCredentialStore {
    /// (namespace, service account) -> attached pull secret names
    service_accounts: Arc<RwLock<HashMap<(String, String), Vec<String>>>>,
    /// (namespace, secret) -> docker config
    secrets: Arc<RwLock<HashMap<(String, String), DockerConfig>>>,
    /// Fail every call with this message
    failure: Option<String>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<StoreOperationCounts>>,
}

/// Counts of store calls, for assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreOperationCounts {
    pub service_account_gets: usize,
    pub secret_gets: usize,
}

impl MockCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service account with attached pull secrets
    pub fn with_service_account(self, namespace: &str, name: &str, secrets: &[&str]) -> Self {
        if let Ok(mut accounts) = self.service_accounts.write() {
            accounts.insert(
                (namespace.to_string(), name.to_string()),
                secrets.iter().map(|s| s.to_string()).collect(),
            );
        }
        self
    }

    /// Register a pull secret
    pub fn with_secret(self, namespace: &str, name: &str, config: DockerConfig) -> Self {
        if let Ok(mut secrets) = self.secrets.write() {
            secrets.insert((namespace.to_string(), name.to_string()), config);
        }
        self
    }

    /// Make every call fail, as if the API server were unreachable
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> StoreOperationCounts {
        self.operations
            .read()
            .map(|ops| ops.clone())
            .unwrap_or_default()
    }

    fn check_failure(&self) -> Result<()> {
        match &self.failure {
            Some(message) => Err(DigesterError::credential(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn pull_secrets_for(
        &self,
        namespace: &str,
        service_account: &str,
    ) -> Result<Vec<String>> {
        if let Ok(mut ops) = self.operations.write() {
            ops.service_account_gets += 1;
        }
        self.check_failure()?;

        let accounts = self
            .service_accounts
            .read()
            .map_err(|e| DigesterError::credential(e.to_string()))?;
        Ok(accounts
            .get(&(namespace.to_string(), service_account.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn docker_config(&self, namespace: &str, secret: &str) -> Result<Option<DockerConfig>> {
        if let Ok(mut ops) = self.operations.write() {
            ops.secret_gets += 1;
        }
        self.check_failure()?;

        let secrets = self
            .secrets
            .read()
            .map_err(|e| DigesterError::credential(e.to_string()))?;
        Ok(secrets
            .get(&(namespace.to_string(), secret.to_string()))
            .cloned())
    }
}

/// Resolver whose digest is the SHA-256 of the image string
///
/// Gives digests the same shape as real ones while staying deterministic.
/// The images `""` and `"error"` fail, as do any registered with
/// [`Sha256Resolver::failing_on`].
#[derive(Clone, Default)]
pub struct Sha256Resolver {
    failing: Vec<String>,
    calls: Arc<RwLock<Vec<ResolveCall>>>,
}

/// One recorded [`Sha256Resolver`] call
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveCall {
    pub image: String,
    pub platform: Option<String>,
    pub credentials: CredentialChain,
}

impl Sha256Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, image: impl Into<String>) -> Self {
        self.failing.push(image.into());
        self
    }

    /// The digest this resolver returns for `image`
    pub fn digest_of(image: &str) -> String {
        use sha2::{Digest, Sha256};
        format!("sha256:{}", hex::encode(Sha256::digest(image.as_bytes())))
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<ResolveCall> {
        self.calls.read().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl DigestResolver for Sha256Resolver {
    async fn resolve(
        &self,
        image: &str,
        platform: Option<&str>,
        credentials: &CredentialChain,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.write() {
            calls.push(ResolveCall {
                image: image.to_string(),
                platform: platform.map(str::to_string),
                credentials: credentials.clone(),
            });
        }
        if image.is_empty() || image == "error" || self.failing.iter().any(|f| f == image) {
            return Err(DigesterError::resolution(
                image,
                format!("intentional error resolving image [{}]", image),
            ));
        }
        Ok(Self::digest_of(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_service_account_has_no_secrets() {
        let store = MockCredentialStore::new();
        assert!(store.pull_secrets_for("ns", "sa").await.unwrap().is_empty());
        assert!(store.docker_config("ns", "secret").await.unwrap().is_none());

        let ops = store.operation_counts();
        assert_eq!(ops.service_account_gets, 1);
        assert_eq!(ops.secret_gets, 1);
    }

    #[tokio::test]
    async fn test_sha256_resolver_matches_known_digest() {
        let resolver = Sha256Resolver::new();
        let digest = resolver
            .resolve(
                "registry.example.com/repository/image:tag",
                None,
                &CredentialChain::anonymous(),
            )
            .await
            .unwrap();
        // echo -n "registry.example.com/repository/image:tag" | shasum -a 256
        assert_eq!(
            digest,
            "sha256:90dc9a6dfb6f86fe35508c9e94d255922bce69c3d5c520b29d65685fab4ee18d"
        );
        assert_eq!(resolver.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_sha256_resolver_failures() {
        let resolver = Sha256Resolver::new().failing_on("broken:1");
        let chain = CredentialChain::anonymous();
        assert!(resolver.resolve("error", None, &chain).await.is_err());
        assert!(resolver.resolve("broken:1", None, &chain).await.is_err());
    }
}
