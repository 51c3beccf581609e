//! Error types for digester-core

use thiserror::Error;

/// Result type for digester-core operations
pub type Result<T> = std::result::Result<T, DigesterError>;

/// Errors that can occur while resolving and mutating a workload
///
/// Every variant is fatal to the request that produced it. The admission
/// layer maps all of them to a single errored decision.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DigesterError {
    /// The workload document could not be parsed
    #[error("could not parse resource: {0}")]
    Parse(String),

    /// Registry credentials could not be assembled for the workload
    #[error("could not create keychain: {0}")]
    Credential(String),

    /// A tag could not be resolved to a digest
    #[error("could not get digest for {image}: {message}")]
    Resolution { image: String, message: String },

    /// Snapshotting or diffing the workload failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The request deadline elapsed before resolution finished
    #[error("resolution timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl DigesterError {
    /// Create a resolution error attributed to an image
    pub fn resolution(image: impl Into<String>, message: impl Into<String>) -> Self {
        DigesterError::Resolution {
            image: image.into(),
            message: message.into(),
        }
    }

    /// Create a credential error
    pub fn credential(message: impl Into<String>) -> Self {
        DigesterError::Credential(message.into())
    }

    /// Short, stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            DigesterError::Parse(_) => "parse",
            DigesterError::Credential(_) => "credential",
            DigesterError::Resolution { .. } => "resolution",
            DigesterError::Serialization(_) => "serialization",
            DigesterError::Timeout { .. } => "timeout",
        }
    }

    /// The image this error is attributed to, if any
    pub fn image(&self) -> Option<&str> {
        match self {
            DigesterError::Resolution { image, .. } => Some(image),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for DigesterError {
    fn from(e: serde_yaml::Error) -> Self {
        DigesterError::Parse(e.to_string())
    }
}
