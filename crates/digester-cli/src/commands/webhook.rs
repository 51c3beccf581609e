//! Webhook command - run the mutating admission webhook

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use digester_core::{CredentialStore, Digester};
use digester_kube::{KubeCredentialStore, WebhookConfig, create_client};
use digester_registry::RegistryDigestResolver;

use crate::error::{CliError, Result};

/// Options for the webhook command
#[derive(Debug, Clone)]
pub struct WebhookOptions {
    pub cert_dir: PathBuf,
    pub port: u16,
    pub health_addr: String,
    pub dry_run: bool,
    pub offline: bool,
    pub ignore_errors: bool,
    pub skip_prefixes: Option<String>,
    pub platform: Option<String>,
    pub kubeconfig: Option<String>,
    pub timeout_seconds: u64,
    pub namespace: String,
}

/// Parse a listen address; a bare `:port` listens on all interfaces
pub fn parse_listen_addr(addr: &str) -> Result<SocketAddr> {
    let full = if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    };
    full.parse().map_err(|e| {
        CliError::usage(
            format!("invalid listen address {:?}: {}", addr, e),
            "use host:port or :port",
        )
    })
}

/// Kubeconfig file to load; `KUBECONFIG` may hold a list
fn kubeconfig_path(kubeconfig: Option<&str>) -> Option<&Path> {
    kubeconfig.and_then(super::first_kubeconfig).map(Path::new)
}

/// Run the webhook command
pub async fn run(options: WebhookOptions) -> Result<()> {
    let mut config = super::engine_config(
        options.skip_prefixes.as_deref(),
        options.platform.as_deref(),
        options.offline,
    )
    .with_dry_run(options.dry_run)
    .with_ignore_errors(options.ignore_errors)
    .with_operating_namespace(options.namespace.clone());
    if let Some(timeout) = super::timeout(options.timeout_seconds) {
        config = config.with_timeout(timeout);
    }

    let webhook = WebhookConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], options.port)),
        health_addr: parse_listen_addr(&options.health_addr)?,
        cert_dir: options.cert_dir.clone(),
    };

    tracing::info!(
        dry_run = config.dry_run,
        offline = config.offline,
        ignore_errors = config.ignore_errors,
        skip_prefixes = config.skip_prefixes.len(),
        namespace = %config.operating_namespace,
        "starting digester webhook"
    );

    let store: Option<Arc<dyn CredentialStore>> = if config.offline {
        None
    } else {
        let client = create_client(kubeconfig_path(options.kubeconfig.as_deref())).await?;
        Some(Arc::new(KubeCredentialStore::new(client)))
    };

    let digester = Digester::builder(Arc::new(RegistryDigestResolver::new()))
        .credential_store(store)
        .config(config)
        .build();

    digester_kube::serve(webhook, Arc::new(digester)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listen_addr() {
        assert_eq!(
            parse_listen_addr(":9090").unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_addr("127.0.0.1:8080").unwrap(),
            "127.0.0.1:8080".parse::<SocketAddr>().unwrap()
        );
        let err = parse_listen_addr("nonsense").unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }

    #[test]
    fn test_kubeconfig_list_uses_first_entry() {
        assert_eq!(
            kubeconfig_path(Some("/etc/kube/a.yaml:/etc/kube/b.yaml")),
            Some(Path::new("/etc/kube/a.yaml"))
        );
        assert_eq!(
            kubeconfig_path(Some("/etc/kube/only.yaml")),
            Some(Path::new("/etc/kube/only.yaml"))
        );
        assert_eq!(kubeconfig_path(Some("")), None);
        assert_eq!(kubeconfig_path(None), None);
    }
}
