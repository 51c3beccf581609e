//! Digest resolution against OCI registries

use async_trait::async_trait;
use oci_distribution::Reference;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol};
use oci_distribution::manifest::ImageIndexEntry;
use oci_distribution::secrets::RegistryAuth;
use std::collections::HashMap;
use std::sync::RwLock;

use digester_core::reference::is_valid_digest;
use digester_core::{CredentialChain, DigestResolver, DigesterError, RegistryCredential};

use crate::error::{RegistryError, Result};
use crate::platform::Platform;

/// Resolves tags by asking the registry for the manifest digest
///
/// Without a platform the digest is the one the tag points to, which for a
/// multi-platform image is the image index. With a platform the matching
/// index entry is resolved instead.
pub struct RegistryDigestResolver {
    protocol: ClientProtocol,
    /// Plain client, used when no platform is requested
    client: Client,
    /// Clients with a platform resolver, one per platform
    platform_clients: RwLock<HashMap<Platform, Client>>,
}

impl Default for RegistryDigestResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryDigestResolver {
    pub fn new() -> Self {
        Self::with_protocol(ClientProtocol::Https)
    }

    /// Use a specific protocol (plain HTTP for local test registries)
    pub fn with_protocol(protocol: ClientProtocol) -> Self {
        let client = Client::new(ClientConfig {
            protocol: protocol.clone(),
            ..Default::default()
        });
        Self {
            protocol,
            client,
            platform_clients: RwLock::new(HashMap::new()),
        }
    }

    fn platform_client(&self, platform: &Platform) -> Client {
        if let Ok(clients) = self.platform_clients.read() {
            if let Some(client) = clients.get(platform) {
                return client.clone();
            }
        }

        let selector = platform.clone();
        let client = Client::new(ClientConfig {
            protocol: self.protocol.clone(),
            platform_resolver: Some(Box::new(move |entries: &[ImageIndexEntry]| {
                selector.select(entries)
            })),
            ..Default::default()
        });
        if let Ok(mut clients) = self.platform_clients.write() {
            clients.insert(platform.clone(), client.clone());
        }
        client
    }

    /// Resolve a digest, with registry-level errors
    pub async fn resolve_digest(
        &self,
        image: &str,
        platform: Option<&str>,
        credentials: &CredentialChain,
    ) -> Result<String> {
        let reference = parse_reference(image)?;
        let auth = registry_auth(credentials, reference.registry());
        let oci_error = |e: oci_distribution::errors::OciDistributionError| RegistryError::Oci {
            image: image.to_string(),
            message: e.to_string(),
        };

        let digest = match platform.filter(|p| !p.is_empty()) {
            None => {
                tracing::debug!(image, registry = reference.registry(), "fetching manifest digest");
                self.client
                    .fetch_manifest_digest(&reference, &auth)
                    .await
                    .map_err(oci_error)?
            }
            Some(platform) => {
                let platform = Platform::parse(platform)?;
                tracing::debug!(
                    image,
                    registry = reference.registry(),
                    platform = %platform,
                    "fetching platform manifest"
                );
                let (_, digest) = self
                    .platform_client(&platform)
                    .pull_image_manifest(&reference, &auth)
                    .await
                    .map_err(oci_error)?;
                digest
            }
        };

        if !is_valid_digest(&digest) {
            return Err(RegistryError::InvalidDigest {
                image: image.to_string(),
                digest,
            });
        }
        Ok(digest)
    }
}

#[async_trait]
impl DigestResolver for RegistryDigestResolver {
    async fn resolve(
        &self,
        image: &str,
        platform: Option<&str>,
        credentials: &CredentialChain,
    ) -> digester_core::Result<String> {
        self.resolve_digest(image, platform, credentials)
            .await
            .map_err(|e| DigesterError::resolution(image, e.to_string()))
    }
}

fn parse_reference(image: &str) -> Result<Reference> {
    Reference::try_from(image).map_err(|e| RegistryError::InvalidReference {
        image: image.to_string(),
        message: e.to_string(),
    })
}

/// Registry auth for a host, taken from the first provider that has one
fn registry_auth(credentials: &CredentialChain, registry: &str) -> RegistryAuth {
    match credentials.credential_for(registry) {
        RegistryCredential::Basic { username, password } => {
            RegistryAuth::Basic(username, password)
        }
        RegistryCredential::Anonymous => RegistryAuth::Anonymous,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digester_core::docker_config::{DockerAuth, DockerConfig};

    fn chain_with(registry: &str, user: &str) -> CredentialChain {
        let mut config = DockerConfig::default();
        config.auths.insert(
            registry.to_string(),
            DockerAuth {
                auth: None,
                username: Some(user.to_string()),
                password: Some("secret".to_string()),
            },
        );
        CredentialChain::offline(config)
    }

    #[test]
    fn test_parse_reference_defaults() {
        let reference = parse_reference("nginx").unwrap();
        assert_eq!(reference.registry(), "docker.io");
        assert_eq!(reference.repository(), "library/nginx");
    }

    #[test]
    fn test_parse_reference_invalid() {
        let err = parse_reference("Invalid Image").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidReference { .. }));
        assert_eq!(err.image(), Some("Invalid Image"));
    }

    #[test]
    fn test_registry_auth_from_chain() {
        let chain = chain_with("registry.example.com", "robot");
        match registry_auth(&chain, "registry.example.com") {
            RegistryAuth::Basic(user, pass) => {
                assert_eq!(user, "robot");
                assert_eq!(pass, "secret");
            }
            _ => panic!("expected basic auth"),
        }
        assert!(matches!(
            registry_auth(&chain, "ghcr.io"),
            RegistryAuth::Anonymous
        ));
    }

    #[tokio::test]
    async fn test_invalid_platform_fails_before_network() {
        let resolver = RegistryDigestResolver::new();
        let err = resolver
            .resolve(
                "registry.example.com/app:v1",
                Some("linux"),
                &CredentialChain::anonymous(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "resolution");
        assert_eq!(err.image(), Some("registry.example.com/app:v1"));
        assert!(err.to_string().contains("invalid platform"));
    }

    #[tokio::test]
    async fn test_invalid_reference_is_attributed() {
        let resolver = RegistryDigestResolver::new();
        let err = resolver
            .resolve("UPPER/Case:v1", None, &CredentialChain::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.image(), Some("UPPER/Case:v1"));
    }
}
