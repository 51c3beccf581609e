//! Digester Kube - Kubernetes integration for digester
//!
//! - `KubeCredentialStore`: service account and pull secret lookup
//! - `webhook`: the mutating admission webhook server
//! - `create_client`: client construction from a kubeconfig

pub mod client;
pub mod error;
pub mod store;
pub mod webhook;

pub use client::create_client;
pub use error::{KubeError, Result};
pub use store::KubeCredentialStore;
pub use webhook::{WebhookConfig, serve};
