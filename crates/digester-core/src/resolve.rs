//! Resolving image tags to digests
//!
//! [`resolve_image_tags`] looks for image fields in these sequence nodes:
//!
//! - `spec.containers`
//! - `spec.initContainers`
//! - `spec.template.spec.containers`
//! - `spec.template.spec.initContainers`
//! - `spec.jobTemplate.spec.template.spec.containers` (CronJob only)
//! - `spec.jobTemplate.spec.template.spec.initContainers` (CronJob only)
//!
//! and rewrites every resolvable `image` to `image@digest`.

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::catalog::WorkloadShape;
use crate::config::SkipPrefixSet;
use crate::error::{DigesterError, Result};
use crate::keychain::CredentialChain;
use crate::reference::{self, ImageReference};
use crate::tree::WorkloadTree;
use crate::walker::{self, ContainerRef};

/// Registry-side tag to digest resolution
#[async_trait]
pub trait DigestResolver: Send + Sync {
    /// Resolve `image` to a digest such as `sha256:<64 hex>`
    ///
    /// `platform` constrains multi-platform images (`None` = resolver default).
    async fn resolve(
        &self,
        image: &str,
        platform: Option<&str>,
        credentials: &CredentialChain,
    ) -> Result<String>;
}

/// What the filter does with one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Matches a skip prefix
    SkipPrefixed,
    /// Already carries a digest
    SkipDigested,
    /// Needs a digest
    Resolve,
}

/// Per-container resolution, for a single workload
pub struct ImageTagFilter<'a> {
    resolver: &'a dyn DigestResolver,
    keychain: &'a CredentialChain,
    skip_prefixes: &'a SkipPrefixSet,
    platform: Option<&'a str>,
}

/// One image rewrite performed by [`ImageTagFilter::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub container: ContainerRef,
    pub digest: String,
    pub pinned: String,
}

impl<'a> ImageTagFilter<'a> {
    pub fn new(
        resolver: &'a dyn DigestResolver,
        keychain: &'a CredentialChain,
        skip_prefixes: &'a SkipPrefixSet,
        platform: Option<&'a str>,
    ) -> Self {
        Self {
            resolver,
            keychain,
            skip_prefixes,
            platform,
        }
    }

    /// Decide what to do with an image string
    pub fn decide(&self, image: &str) -> FilterDecision {
        if self.skip_prefixes.matches(image) {
            FilterDecision::SkipPrefixed
        } else if reference::has_digest(image) {
            FilterDecision::SkipDigested
        } else {
            FilterDecision::Resolve
        }
    }

    /// Resolve one container, returning `None` when it is skipped
    async fn resolve_container(&self, container: ContainerRef) -> Result<Option<ResolvedImage>> {
        match self.decide(&container.image) {
            FilterDecision::SkipPrefixed => {
                tracing::debug!(image = %container.image, "image matches skip prefix");
                return Ok(None);
            }
            FilterDecision::SkipDigested => {
                tracing::debug!(image = %container.image, "image already has digest");
                return Ok(None);
            }
            FilterDecision::Resolve => {}
        }

        let parsed = ImageReference::parse(&container.image)?;
        tracing::debug!(image = %container.image, reference = %parsed, "resolving tag");

        let digest = self
            .resolver
            .resolve(&container.image, self.platform, self.keychain)
            .await
            .map_err(|e| attribute(e, &container.image))?;
        if !reference::is_valid_digest(&digest) {
            return Err(DigesterError::resolution(
                &container.image,
                format!("resolver returned malformed digest {:?}", digest),
            ));
        }

        tracing::debug!(image = %container.image, digest = %digest, "resolved tag to digest");
        let pinned = reference::pin(&container.image, &digest);
        Ok(Some(ResolvedImage {
            container,
            digest,
            pinned,
        }))
    }

    /// Resolve every container of the workload, then write the results back
    ///
    /// Lookups run concurrently. The tree is only modified once all of them
    /// succeeded; the first failure aborts the rest and leaves it untouched.
    pub async fn apply(&self, tree: &mut WorkloadTree) -> Result<Vec<ResolvedImage>> {
        let shape = WorkloadShape::from_kind(tree.kind());
        let containers: Vec<ContainerRef> = walker::locate(tree, shape.paths()).collect();

        let resolved: Vec<ResolvedImage> =
            try_join_all(containers.into_iter().map(|c| self.resolve_container(c)))
                .await?
                .into_iter()
                .flatten()
                .collect();

        for image in &resolved {
            let path = image.container.image_path();
            let pointer = path.to_pointer();
            tracing::debug!(path = pointer.as_str(), image = %image.pinned, "writing pinned image");
            tree.set_string(&path, image.pinned.clone())?;
        }
        Ok(resolved)
    }
}

/// Make sure resolver errors name the image they belong to
fn attribute(err: DigesterError, image: &str) -> DigesterError {
    match err {
        DigesterError::Resolution { .. } | DigesterError::Timeout { .. } => err,
        other => DigesterError::resolution(image, other.to_string()),
    }
}

/// Resolve all image tags in a workload in place
///
/// Returns the rewrites performed, in document order.
pub async fn resolve_image_tags(
    tree: &mut WorkloadTree,
    keychain: &CredentialChain,
    resolver: &dyn DigestResolver,
    skip_prefixes: &SkipPrefixSet,
    platform: Option<&str>,
) -> Result<Vec<ResolvedImage>> {
    ImageTagFilter::new(resolver, keychain, skip_prefixes, platform)
        .apply(tree)
        .await
}
