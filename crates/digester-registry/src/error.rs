//! Error types for registry resolution

use thiserror::Error;

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry resolution errors
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The image string is not a valid OCI reference
    #[error("invalid image reference {image}: {message}")]
    InvalidReference { image: String, message: String },

    /// The platform string is not `os/arch[/variant]`
    #[error("invalid platform {platform:?}: expected os/arch[/variant]")]
    InvalidPlatform { platform: String },

    /// The registry request failed (transport, auth or not found)
    #[error("registry error for {image}: {message}")]
    Oci { image: String, message: String },

    /// The registry returned something that is not a digest
    #[error("registry returned malformed digest {digest:?} for {image}")]
    InvalidDigest { image: String, digest: String },
}

impl RegistryError {
    /// The image this error is attributed to, if any
    pub fn image(&self) -> Option<&str> {
        match self {
            RegistryError::InvalidReference { image, .. }
            | RegistryError::Oci { image, .. }
            | RegistryError::InvalidDigest { image, .. } => Some(image),
            RegistryError::InvalidPlatform { .. } => None,
        }
    }
}
