//! Platform selection for multi-platform images

use oci_distribution::manifest::ImageIndexEntry;
use std::fmt;
use std::str::FromStr;

use crate::error::RegistryError;

/// Target platform, `os/arch[/variant]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

impl Platform {
    /// Parse `linux/amd64` or `linux/arm64/v8`
    pub fn parse(s: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidPlatform {
            platform: s.to_string(),
        };

        let parts: Vec<&str> = s.split('/').collect();
        if parts.iter().any(|p| p.is_empty() || p.chars().any(char::is_whitespace)) {
            return Err(invalid());
        }
        match parts.as_slice() {
            [os, architecture] => Ok(Self {
                os: os.to_string(),
                architecture: architecture.to_string(),
                variant: None,
            }),
            [os, architecture, variant] => Ok(Self {
                os: os.to_string(),
                architecture: architecture.to_string(),
                variant: Some(variant.to_string()),
            }),
            _ => Err(invalid()),
        }
    }

    /// Whether an image index entry is built for this platform
    ///
    /// A variant only has to match when this platform names one.
    pub fn matches(&self, entry: &ImageIndexEntry) -> bool {
        let Some(platform) = &entry.platform else {
            return false;
        };
        if platform.os != self.os || platform.architecture != self.architecture {
            return false;
        }
        match &self.variant {
            Some(variant) => platform.variant.as_deref() == Some(variant.as_str()),
            None => true,
        }
    }

    /// Digest of the first matching index entry
    pub fn select(&self, entries: &[ImageIndexEntry]) -> Option<String> {
        entries
            .iter()
            .find(|entry| self.matches(entry))
            .map(|entry| entry.digest.clone())
    }
}

impl FromStr for Platform {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{}", variant)?;
        }
        Ok(())
    }
}
