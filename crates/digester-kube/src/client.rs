//! Kubernetes client construction

use kube::Client;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use std::path::Path;

use crate::error::{KubeError, Result};

/// Create a client from an explicit kubeconfig, or the default chain
///
/// Without a path this is in-cluster config, then `$KUBECONFIG` and
/// `~/.kube/config`.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                KubeError::Kubeconfig(format!("failed to read {}: {}", path.display(), e))
            })?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|e| KubeError::Kubeconfig(format!("failed to load kubeconfig: {}", e)))?;
            Ok(Client::try_from(config)?)
        }
        None => Ok(Client::try_default().await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_kubeconfig_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let Err(err) = create_client(Some(&dir.path().join("missing"))).await else {
            panic!("expected missing kubeconfig to fail");
        };
        assert!(matches!(err, KubeError::Kubeconfig(_)));
    }
}
