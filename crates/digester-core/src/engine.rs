//! The digester engine
//!
//! [`Digester`] owns the configuration and the two injected capabilities
//! (registry resolution and cluster credential lookup). It serves both
//! transports: [`Digester::review`] for admission requests and
//! [`Digester::resolve_tree`] for manifests passed through whole.

use std::sync::Arc;

use crate::admission::{AdmissionInput, AdmissionOutcome, Reason};
use crate::config::EngineConfig;
use crate::docker_config::DockerConfig;
use crate::error::{DigesterError, Result};
use crate::keychain::{self, CredentialStore};
use crate::patch;
use crate::resolve::{DigestResolver, ResolvedImage, resolve_image_tags};
use crate::tree::WorkloadTree;

/// Builder for [`Digester`]
pub struct DigesterBuilder {
    resolver: Arc<dyn DigestResolver>,
    store: Option<Arc<dyn CredentialStore>>,
    docker_config: Option<DockerConfig>,
    config: EngineConfig,
}

impl DigesterBuilder {
    pub fn new(resolver: Arc<dyn DigestResolver>) -> Self {
        Self {
            resolver,
            store: None,
            docker_config: None,
            config: EngineConfig::default(),
        }
    }

    /// Cluster credential store (ignored when the config is offline)
    pub fn credential_store(mut self, store: Option<Arc<dyn CredentialStore>>) -> Self {
        self.store = store;
        self
    }

    /// Use this local Docker config instead of loading `~/.docker/config.json`
    pub fn docker_config(mut self, config: DockerConfig) -> Self {
        self.docker_config = Some(config);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the engine
    pub fn build(self) -> Digester {
        let store = if self.config.offline {
            if self.store.is_some() {
                tracing::debug!("offline mode, ignoring credential store");
            }
            None
        } else {
            self.store
        };
        Digester {
            resolver: self.resolver,
            store,
            docker_config: self.docker_config,
            config: self.config,
        }
    }
}

/// Pins workload images to digests
///
/// Holds no per-request state; one instance serves concurrent requests.
#[derive(Clone)]
pub struct Digester {
    resolver: Arc<dyn DigestResolver>,
    store: Option<Arc<dyn CredentialStore>>,
    docker_config: Option<DockerConfig>,
    config: EngineConfig,
}

impl Digester {
    pub fn builder(resolver: Arc<dyn DigestResolver>) -> DigesterBuilder {
        DigesterBuilder::new(resolver)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide one admission request
    pub async fn review(&self, input: &AdmissionInput) -> AdmissionOutcome {
        tracing::info!(
            operation = %input.operation,
            namespace = %input.namespace,
            name = input.name.as_deref().unwrap_or_default(),
            kind = input.kind.as_deref().unwrap_or_default(),
            "received request"
        );

        if !input.operation.is_mutating() {
            return AdmissionOutcome::unchanged(Reason::NoMutationForOperation);
        }
        if input.namespace == self.config.operating_namespace {
            return AdmissionOutcome::unchanged(Reason::NoSelfManagement);
        }

        match self.mutate(input).await {
            Ok(operations) if operations.is_empty() => {
                AdmissionOutcome::unchanged(Reason::NotPatched)
            }
            Ok(operations) if self.config.dry_run => {
                tracing::info!(
                    operations = operations.len(),
                    "not mutating resource, because dry-run=true"
                );
                AdmissionOutcome::unchanged(Reason::NotPatched)
            }
            Ok(operations) => AdmissionOutcome::AllowedWithPatch {
                reason: Reason::Patched,
                operations,
            },
            Err(error) if self.config.ignore_errors => {
                tracing::warn!(error = %error, kind = error.kind(), "ignored admission error");
                AdmissionOutcome::unchanged(Reason::ErrorIgnored)
            }
            Err(error) => {
                tracing::error!(error = %error, kind = error.kind(), "admission error");
                AdmissionOutcome::Denied { error }
            }
        }
    }

    /// Parse, resolve and diff; the operations are returned even in dry-run
    async fn mutate(&self, input: &AdmissionInput) -> Result<Vec<json_patch::PatchOperation>> {
        let mut tree = WorkloadTree::from_json(&input.raw_object)?;
        if tree.namespace().is_none() {
            tree.set_namespace(&input.namespace)?;
        }

        let before = tree.snapshot()?;
        self.resolve_tree(&mut tree).await?;
        let after = tree.snapshot()?;

        let operations = patch::create_patch(&before, &after)?;
        tracing::debug!(operations = operations.len(), "patched resource");
        Ok(operations)
    }

    /// Resolve every image of a tree in place
    ///
    /// The tree is left untouched on error.
    pub async fn resolve_tree(&self, tree: &mut WorkloadTree) -> Result<Vec<ResolvedImage>> {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, self.resolve_untimed(tree))
                .await
                .map_err(|_| DigesterError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => self.resolve_untimed(tree).await,
        }
    }

    async fn resolve_untimed(&self, tree: &mut WorkloadTree) -> Result<Vec<ResolvedImage>> {
        let local = match &self.docker_config {
            Some(config) => config.clone(),
            None => DockerConfig::load_default(),
        };
        let keychain = keychain::create(tree, self.store.as_deref(), local).await?;

        // The tree is only written after every lookup succeeded, so a
        // timeout dropping this future leaves it unmodified.
        resolve_image_tags(
            tree,
            &keychain,
            self.resolver.as_ref(),
            &self.config.skip_prefixes,
            self.config.platform.as_deref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::Operation;
    use crate::config::SkipPrefixSet;
    use crate::keychain::{CredentialChain, CredentialProvider};
    use crate::mock::{MockCredentialStore, Sha256Resolver};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    const IMAGE: &str = "registry.example.com/repository/image:tag";

    fn digester(config: EngineConfig) -> Digester {
        Digester::builder(Arc::new(Sha256Resolver::new()))
            .docker_config(DockerConfig::default())
            .config(config.with_offline(true))
            .build()
    }

    fn pod_bytes(images: &[&str]) -> Vec<u8> {
        let containers: Vec<_> = images
            .iter()
            .enumerate()
            .map(|(i, image)| json!({"name": format!("container{}", i), "image": image}))
            .collect();
        serde_json::to_vec(&json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "test-pod"},
            "spec": {"containers": containers}
        }))
        .unwrap()
    }

    fn create(raw: Vec<u8>) -> AdmissionInput {
        AdmissionInput::new(Operation::Create, "test-ns", raw)
    }

    fn patch_json(outcome: &AdmissionOutcome) -> serde_json::Value {
        serde_json::to_value(outcome.operations()).unwrap()
    }

    #[tokio::test]
    async fn test_patched_single_image() {
        let outcome = digester(EngineConfig::default())
            .review(&create(pod_bytes(&[IMAGE])))
            .await;

        assert_eq!(outcome.reason(), Some(Reason::Patched));
        assert_eq!(
            patch_json(&outcome),
            json!([{
                "op": "replace",
                "path": "/spec/containers/0/image",
                "value": "registry.example.com/repository/image:tag@sha256:90dc9a6dfb6f86fe35508c9e94d255922bce69c3d5c520b29d65685fab4ee18d"
            }])
        );
    }

    #[tokio::test]
    async fn test_skip_prefix_patch_minimality() {
        let config = EngineConfig::default()
            .with_skip_prefixes(SkipPrefixSet::parse("skip1.local"));
        let outcome = digester(config)
            .review(&create(pod_bytes(&["image0", "skip1.local/image1"])))
            .await;

        assert_eq!(outcome.reason(), Some(Reason::Patched));
        assert_eq!(
            patch_json(&outcome),
            json!([{
                "op": "replace",
                "path": "/spec/containers/0/image",
                "value": "image0@sha256:07d7d43fe9dd151e40f0a8d54c5211a8601b04e4a8fa7ad57ea5e73e4ffa7e4a"
            }])
        );
    }

    #[tokio::test]
    async fn test_already_digested_is_idempotent() {
        let pinned = format!("{}@{}", IMAGE, Sha256Resolver::digest_of(IMAGE));
        let outcome = digester(EngineConfig::default())
            .review(&create(pod_bytes(&[&pinned])))
            .await;

        assert_eq!(outcome.reason(), Some(Reason::NotPatched));
        assert!(outcome.operations().is_empty());
    }

    #[tokio::test]
    async fn test_non_mutating_operations() {
        let engine = digester(EngineConfig::default());
        for operation in [Operation::Delete, Operation::Connect] {
            let input = AdmissionInput::new(operation, "test-ns", b"not parsed".to_vec());
            let outcome = engine.review(&input).await;
            assert_eq!(outcome.reason(), Some(Reason::NoMutationForOperation));
        }
    }

    #[tokio::test]
    async fn test_update_is_mutated() {
        let input = AdmissionInput::new(Operation::Update, "test-ns", pod_bytes(&["image0"]));
        let outcome = digester(EngineConfig::default()).review(&input).await;
        assert_eq!(outcome.reason(), Some(Reason::Patched));
    }

    #[tokio::test]
    async fn test_self_management_guard() {
        let config = EngineConfig::default().with_operating_namespace("digester-system");
        let input = AdmissionInput::new(Operation::Create, "digester-system", pod_bytes(&[IMAGE]));
        let outcome = digester(config).review(&input).await;

        assert_eq!(outcome.reason(), Some(Reason::NoSelfManagement));
        assert!(outcome.operations().is_empty());
    }

    #[tokio::test]
    async fn test_self_management_precedes_parse() {
        let input = AdmissionInput::new(Operation::Create, "digester-system", b"{".to_vec());
        let outcome = digester(EngineConfig::default()).review(&input).await;
        assert_eq!(outcome.reason(), Some(Reason::NoSelfManagement));
    }

    #[tokio::test]
    async fn test_dry_run_suppresses_patch() {
        let outcome = digester(EngineConfig::default().with_dry_run(true))
            .review(&create(pod_bytes(&[IMAGE])))
            .await;

        assert_eq!(outcome.reason(), Some(Reason::NotPatched));
        assert!(outcome.operations().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_still_resolves() {
        let resolver = Arc::new(Sha256Resolver::new());
        let engine = Digester::builder(resolver.clone())
            .docker_config(DockerConfig::default())
            .config(EngineConfig::default().with_offline(true).with_dry_run(true))
            .build();
        engine.review(&create(pod_bytes(&["image0", "image1"]))).await;
        assert_eq!(resolver.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_parse_error_is_denied() {
        let outcome = digester(EngineConfig::default())
            .review(&create(b"{not json".to_vec()))
            .await;
        assert!(!outcome.is_allowed());
        assert_eq!(outcome.error().map(|e| e.kind()), Some("parse"));
    }

    #[tokio::test]
    async fn test_resolution_error_is_denied() {
        let outcome = digester(EngineConfig::default())
            .review(&create(pod_bytes(&["image0", "error"])))
            .await;
        let error = outcome.error().unwrap();
        assert_eq!(error.kind(), "resolution");
        assert_eq!(error.image(), Some("error"));
    }

    #[tokio::test]
    async fn test_ignore_errors() {
        let outcome = digester(EngineConfig::default().with_ignore_errors(true))
            .review(&create(pod_bytes(&["error"])))
            .await;
        assert!(outcome.is_allowed());
        assert_eq!(outcome.reason(), Some(Reason::ErrorIgnored));
        assert!(outcome.operations().is_empty());
    }

    #[tokio::test]
    async fn test_ignore_errors_covers_parse_failures() {
        let outcome = digester(EngineConfig::default().with_ignore_errors(true))
            .review(&create(b"[]".to_vec()))
            .await;
        assert_eq!(outcome.reason(), Some(Reason::ErrorIgnored));
    }

    #[tokio::test]
    async fn test_namespace_copied_before_snapshot() {
        // The namespace write-back is part of the "before" snapshot, so it
        // never shows up as a patch operation.
        let outcome = digester(EngineConfig::default())
            .review(&create(pod_bytes(&["image0"])))
            .await;
        assert_eq!(outcome.operations().len(), 1);
        assert_eq!(patch_json(&outcome)[0]["op"], "replace");
    }

    #[tokio::test]
    async fn test_request_namespace_drives_credentials() {
        let store = MockCredentialStore::new()
            .with_service_account("team-a", "default", &["pull"])
            .with_secret("team-a", "pull", DockerConfig::default());
        let resolver = Arc::new(Sha256Resolver::new());
        let engine = Digester::builder(resolver.clone())
            .credential_store(Some(Arc::new(store.clone())))
            .docker_config(DockerConfig::default())
            .build();

        let input = AdmissionInput::new(Operation::Create, "team-a", pod_bytes(&["image0"]));
        let outcome = engine.review(&input).await;
        assert_eq!(outcome.reason(), Some(Reason::Patched));

        let calls = resolver.calls();
        match &calls[0].credentials.providers()[0] {
            CredentialProvider::Cluster { namespace, secrets } => {
                assert_eq!(namespace, "team-a");
                assert_eq!(secrets.len(), 1);
            }
            other => panic!("expected cluster provider, got {:?}", other),
        }
        assert_eq!(store.operation_counts().service_account_gets, 1);
    }

    #[tokio::test]
    async fn test_credential_store_failure_is_denied() {
        let store = MockCredentialStore::new().failing("connection refused");
        let engine = Digester::builder(Arc::new(Sha256Resolver::new()))
            .credential_store(Some(Arc::new(store)))
            .docker_config(DockerConfig::default())
            .build();

        let outcome = engine.review(&create(pod_bytes(&["image0"]))).await;
        assert_eq!(outcome.error().map(|e| e.kind()), Some("credential"));
    }

    #[tokio::test]
    async fn test_offline_ignores_store() {
        let store = MockCredentialStore::new().failing("must not be called");
        let engine = Digester::builder(Arc::new(Sha256Resolver::new()))
            .credential_store(Some(Arc::new(store.clone())))
            .docker_config(DockerConfig::default())
            .config(EngineConfig::default().with_offline(true))
            .build();

        let outcome = engine.review(&create(pod_bytes(&["image0"]))).await;
        assert_eq!(outcome.reason(), Some(Reason::Patched));
        assert_eq!(store.operation_counts().service_account_gets, 0);
    }

    #[tokio::test]
    async fn test_resolve_tree_in_place() {
        let mut tree = WorkloadTree::from_yaml(
            r#"
apiVersion: batch/v1
kind: CronJob
metadata:
  name: nightly
spec:
  jobTemplate:
    spec:
      template:
        spec:
          containers:
            - name: job
              image: image0
"#,
        )
        .unwrap();

        let resolved = digester(EngineConfig::default())
            .resolve_tree(&mut tree)
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(
            tree.as_value()
                .pointer("/spec/jobTemplate/spec/template/spec/containers/0/image")
                .and_then(|v| v.as_str()),
            Some("image0@sha256:07d7d43fe9dd151e40f0a8d54c5211a8601b04e4a8fa7ad57ea5e73e4ffa7e4a")
        );
        assert_eq!(tree.namespace(), None);
    }

    struct SlowResolver;

    #[async_trait]
    impl DigestResolver for SlowResolver {
        async fn resolve(&self, image: &str, _: Option<&str>, _: &CredentialChain) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Sha256Resolver::digest_of(image))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_errored() {
        let engine = Digester::builder(Arc::new(SlowResolver))
            .docker_config(DockerConfig::default())
            .config(
                EngineConfig::default()
                    .with_offline(true)
                    .with_timeout(Duration::from_secs(10)),
            )
            .build();

        let outcome = engine.review(&create(pod_bytes(&["image0"]))).await;
        assert!(matches!(
            outcome.error(),
            Some(DigesterError::Timeout { seconds: 10 })
        ));
    }
}
