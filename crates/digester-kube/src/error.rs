//! Error types for digester-kube

use thiserror::Error;

/// Result type for digester-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur talking to the cluster or serving the webhook
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    /// Kubeconfig could not be read or loaded
    #[error("kubeconfig error: {0}")]
    Kubeconfig(String),

    /// A pull secret exists but its content is unusable
    #[error("invalid pull secret '{name}' in namespace '{namespace}': {message}")]
    InvalidSecret {
        namespace: String,
        name: String,
        message: String,
    },

    /// TLS material could not be loaded
    #[error("TLS error: {0}")]
    Tls(String),

    /// The HTTP server failed
    #[error("server error: {0}")]
    Server(String),
}
