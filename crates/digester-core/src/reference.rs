//! Container image references
//!
//! Parsing follows the Docker distribution grammar closely enough to find the
//! registry host (for credential selection) and to tell tags from digests:
//!
//! - `nginx` → `docker.io/library/nginx`, no tag
//! - `localhost:5000/app:v1` → registry `localhost:5000`, tag `v1`
//! - `gcr.io/p/app:v1@sha256:…` → tag `v1` and digest

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::error::{DigesterError, Result};

/// Registry used when a reference names none
pub const DEFAULT_REGISTRY: &str = "docker.io";

/// Separator between a reference and its digest
pub const DIGEST_SEPARATOR: char = '@';

static DIGEST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[.+_-][a-z0-9]+)*:[a-zA-Z0-9=_-]+$").expect("valid digest regex")
});

static SHA256_HEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("valid sha256 regex"));

/// Parsed image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub registry: String,
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image string
    pub fn parse(image: &str) -> Result<Self> {
        let invalid = |reason: &str| DigesterError::resolution(image, format!("invalid reference: {}", reason));

        if image.is_empty() {
            return Err(invalid("empty image"));
        }
        if image.chars().any(char::is_whitespace) {
            return Err(invalid("contains whitespace"));
        }

        let (name_tag, digest) = match image.split_once(DIGEST_SEPARATOR) {
            Some((name_tag, digest)) => {
                if !is_valid_digest(digest) {
                    return Err(invalid("malformed digest"));
                }
                (name_tag, Some(digest.to_string()))
            }
            None => (image, None),
        };

        // A tag can only follow the last path component, so a colon
        // before the final slash belongs to a registry port.
        let last_slash = name_tag.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match name_tag[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &name_tag[split + 1..];
                if tag.is_empty() {
                    return Err(invalid("empty tag"));
                }
                (&name_tag[..split], Some(tag.to_string()))
            }
            None => (name_tag, None),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => {
                (first.to_string(), rest.to_string())
            }
            _ => {
                let repository = if name.contains('/') {
                    name.to_string()
                } else {
                    format!("library/{}", name)
                };
                (DEFAULT_REGISTRY.to_string(), repository)
            }
        };

        if repository.is_empty() || repository.ends_with('/') {
            return Err(invalid("empty repository"));
        }
        if repository.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(invalid("repository must be lowercase"));
        }

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Append a digest to an image string, keeping any tag
pub fn pin(image: &str, digest: &str) -> String {
    format!("{}{}{}", image, DIGEST_SEPARATOR, digest)
}

/// Whether the string carries a digest separator
pub fn has_digest(image: &str) -> bool {
    image.contains(DIGEST_SEPARATOR)
}

/// Validate `algorithm:encoded`; sha256 digests must be 64 lowercase hex chars
pub fn is_valid_digest(digest: &str) -> bool {
    if !DIGEST_RE.is_match(digest) {
        return false;
    }
    match digest.split_once(':') {
        Some(("sha256", hex)) => SHA256_HEX_RE.is_match(hex),
        _ => true,
    }
}

fn is_registry_host(component: &str) -> bool {
    component.contains('.') || component.contains(':') || component == "localhost"
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:90dc9a6dfb6f86fe35508c9e94d255922bce69c3d5c520b29d65685fab4ee18d";

    #[test]
    fn test_parse_full_reference() {
        let r = ImageReference::parse("registry.example.com/repository/image:tag").unwrap();
        assert_eq!(r.registry, "registry.example.com");
        assert_eq!(r.repository, "repository/image");
        assert_eq!(r.tag.as_deref(), Some("tag"));
        assert_eq!(r.digest, None);
    }

    #[test]
    fn test_parse_docker_hub_short_names() {
        let r = ImageReference::parse("nginx").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "library/nginx");
        assert_eq!(r.tag, None);

        let r = ImageReference::parse("bitnami/redis:7.2").unwrap();
        assert_eq!(r.registry, "docker.io");
        assert_eq!(r.repository, "bitnami/redis");
        assert_eq!(r.tag.as_deref(), Some("7.2"));
    }

    #[test]
    fn test_parse_registry_with_port() {
        let r = ImageReference::parse("localhost:5000/app").unwrap();
        assert_eq!(r.registry, "localhost:5000");
        assert_eq!(r.repository, "app");
        assert_eq!(r.tag, None);

        let r = ImageReference::parse("registry.local:5000/team/app:v2").unwrap();
        assert_eq!(r.registry, "registry.local:5000");
        assert_eq!(r.tag.as_deref(), Some("v2"));
    }

    #[test]
    fn test_parse_with_digest() {
        let image = format!("gcr.io/project/app:v1@{}", DIGEST);
        let r = ImageReference::parse(&image).unwrap();
        assert_eq!(r.tag.as_deref(), Some("v1"));
        assert_eq!(r.digest.as_deref(), Some(DIGEST));
        assert_eq!(r.to_string(), image);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(ImageReference::parse("").is_err());
        assert!(ImageReference::parse("app:").is_err());
        assert!(ImageReference::parse("Registry.io/App:v1").is_err());
        assert!(ImageReference::parse("app@sha256:short").is_err());
        assert!(ImageReference::parse("has space:v1").is_err());
    }

    #[test]
    fn test_pin_keeps_tag() {
        assert_eq!(pin("app:v1", DIGEST), format!("app:v1@{}", DIGEST));
        assert!(has_digest(&pin("app", DIGEST)));
    }

    #[test]
    fn test_digest_validation() {
        assert!(is_valid_digest(DIGEST));
        assert!(is_valid_digest("sha512:abcdef0123"));
        assert!(!is_valid_digest("sha256:ABCDEF"));
        assert!(!is_valid_digest("sha256:"));
        assert!(!is_valid_digest("digest"));
    }
}
