//! Docker config credentials
//!
//! The same `auths` format backs three credential sources: the local
//! `~/.docker/config.json`, `kubernetes.io/dockerconfigjson` pull secrets,
//! and the legacy `kubernetes.io/dockercfg` secrets (a bare registry map).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{DigesterError, Result};

/// Registry hosts that all mean Docker Hub
const DOCKER_HUB_ALIASES: &[&str] = &[
    "docker.io",
    "index.docker.io",
    "registry-1.docker.io",
];

/// Credential presented to a registry
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryCredential {
    /// No authentication
    Anonymous,
    /// Basic authentication (username/password or token)
    Basic { username: String, password: String },
}

impl RegistryCredential {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        RegistryCredential::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, RegistryCredential::Anonymous)
    }
}

impl fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryCredential::Anonymous => f.write_str("Anonymous"),
            RegistryCredential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

/// Docker config.json format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    pub auths: BTreeMap<String, DockerAuth>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerAuth {
    #[serde(default)]
    pub auth: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl DockerAuth {
    fn credential(&self) -> Option<RegistryCredential> {
        if let (Some(u), Some(p)) = (&self.username, &self.password) {
            if !u.is_empty() || !p.is_empty() {
                return Some(RegistryCredential::basic(u, p));
            }
        }
        let encoded = self.auth.as_deref().filter(|a| !a.is_empty())?;
        let decoded =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, pass) = decoded.split_once(':')?;
        Some(RegistryCredential::basic(user, pass))
    }
}

impl DockerConfig {
    /// Parse `.dockerconfigjson` content (`{"auths": {...}}`)
    pub fn from_config_json(data: &[u8]) -> Result<Self> {
        serde_json::from_slice(data)
            .map_err(|e| DigesterError::credential(format!("malformed docker config: {}", e)))
    }

    /// Parse legacy `.dockercfg` content (a bare registry map)
    pub fn from_dockercfg(data: &[u8]) -> Result<Self> {
        let auths: BTreeMap<String, DockerAuth> = serde_json::from_slice(data)
            .map_err(|e| DigesterError::credential(format!("malformed dockercfg: {}", e)))?;
        Ok(Self { auths })
    }

    /// Load the local Docker config
    ///
    /// Uses `$DOCKER_CONFIG/config.json`, then `~/.docker/config.json`. A
    /// missing or unreadable file yields an empty config.
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring docker config");
                Self::default()
            }
        }
    }

    /// Load from an explicit path; a missing file yields an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read(path).map_err(|e| {
            DigesterError::credential(format!("could not read {}: {}", path.display(), e))
        })?;
        Self::from_config_json(&content)
    }

    fn default_path() -> Option<PathBuf> {
        if let Some(dir) = std::env::var_os("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }

    pub fn is_empty(&self) -> bool {
        self.auths.is_empty()
    }

    /// Credential for a registry host, if this config has one
    pub fn credential_for(&self, registry: &str) -> Option<RegistryCredential> {
        let wanted = canonical_host(registry);
        self.auths
            .iter()
            .filter(|(key, _)| canonical_host(&registry_host(key)) == wanted)
            .find_map(|(_, auth)| auth.credential())
    }
}

/// Strip scheme and path from a config key (`https://index.docker.io/v1/`)
fn registry_host(key: &str) -> String {
    let without_scheme = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    without_scheme
        .split('/')
        .next()
        .unwrap_or(without_scheme)
        .to_ascii_lowercase()
}

fn canonical_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    if DOCKER_HUB_ALIASES.contains(&host.as_str()) {
        DOCKER_HUB_ALIASES[0].to_string()
    } else {
        host
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(user: &str, pass: &str) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", user, pass),
        )
    }

    #[test]
    fn test_config_json_with_auth_field() {
        let data = format!(
            r#"{{"auths": {{"registry.example.com": {{"auth": "{}"}}}}}}"#,
            encoded("username", "password")
        );
        let config = DockerConfig::from_config_json(data.as_bytes()).unwrap();
        assert_eq!(
            config.credential_for("registry.example.com"),
            Some(RegistryCredential::basic("username", "password"))
        );
        assert_eq!(config.credential_for("other.example.com"), None);
    }

    #[test]
    fn test_username_password_fields() {
        let data = br#"{"auths": {"https://ghcr.io": {"username": "bot", "password": "tok"}}}"#;
        let config = DockerConfig::from_config_json(data).unwrap();
        assert_eq!(
            config.credential_for("ghcr.io"),
            Some(RegistryCredential::basic("bot", "tok"))
        );
    }

    #[test]
    fn test_docker_hub_aliases() {
        let data = format!(
            r#"{{"auths": {{"https://index.docker.io/v1/": {{"auth": "{}"}}}}}}"#,
            encoded("hub", "secret")
        );
        let config = DockerConfig::from_config_json(data.as_bytes()).unwrap();
        assert!(config.credential_for("docker.io").is_some());
        assert!(config.credential_for("registry-1.docker.io").is_some());
    }

    #[test]
    fn test_legacy_dockercfg() {
        let data = format!(r#"{{"quay.io": {{"auth": "{}"}}}}"#, encoded("q", "p"));
        let config = DockerConfig::from_dockercfg(data.as_bytes()).unwrap();
        assert_eq!(
            config.credential_for("QUAY.io"),
            Some(RegistryCredential::basic("q", "p"))
        );
    }

    #[test]
    fn test_malformed_is_credential_error() {
        let err = DockerConfig::from_config_json(b"{not json").unwrap_err();
        assert_eq!(err.kind(), "credential");
    }

    #[test]
    fn test_undecodable_auth_is_skipped() {
        let data = br#"{"auths": {"r.io": {"auth": "!!!"}}}"#;
        let config = DockerConfig::from_config_json(data).unwrap();
        assert_eq!(config.credential_for("r.io"), None);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = DockerConfig::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            format!(r#"{{"auths": {{"r.io": {{"auth": "{}"}}}}}}"#, encoded("a", "b")),
        )
        .unwrap();
        let config = DockerConfig::load_from(&path).unwrap();
        assert!(config.credential_for("r.io").is_some());
    }

    #[test]
    fn test_debug_redacts_password() {
        let rendered = format!("{:?}", RegistryCredential::basic("user", "hunter2"));
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }
}
