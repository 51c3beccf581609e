//! CLI error types with exit code handling

use digester_core::DigesterError;
use digester_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid flag or argument value
    #[error("Invalid argument: {message}")]
    #[diagnostic(code(digester::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Input could not be parsed as Kubernetes resources
    #[error("Parse error: {message}")]
    #[diagnostic(
        code(digester::cli::parse),
        help("input must be a ResourceList or a YAML stream of resources")
    )]
    Parse { message: String },

    /// An image could not be resolved
    #[error("Resolution failed: {message}")]
    #[diagnostic(code(digester::cli::resolution))]
    Resolution {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Cluster access failed
    #[error("Kubernetes error: {message}")]
    #[diagnostic(code(digester::cli::kube))]
    Kube { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(digester::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(digester::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Parse { .. } => exit_codes::ERROR,
            CliError::Resolution { .. } => exit_codes::RESOLUTION_ERROR,
            CliError::Kube { .. } => exit_codes::ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error with help text
    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<DigesterError> for CliError {
    fn from(err: DigesterError) -> Self {
        match &err {
            DigesterError::Parse(_) => CliError::parse(err.to_string()),
            DigesterError::Credential(_) => CliError::Kube {
                message: err.to_string(),
            },
            DigesterError::Resolution { .. } | DigesterError::Timeout { .. } => {
                CliError::Resolution {
                    message: err.to_string(),
                    help: Some(
                        "use --skip-prefixes for images that should not be resolved".to_string(),
                    ),
                }
            }
            _ => CliError::internal(err.to_string()),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        CliError::Kube {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digester_error_exit_codes() {
        let err: CliError = DigesterError::resolution("nginx:1.25", "manifest unknown").into();
        assert_eq!(err.exit_code(), exit_codes::RESOLUTION_ERROR);

        let err: CliError = DigesterError::Timeout { seconds: 10 }.into();
        assert_eq!(err.exit_code(), exit_codes::RESOLUTION_ERROR);

        let err: CliError = DigesterError::Parse("bad".to_string()).into();
        assert!(matches!(err, CliError::Parse { .. }));

        let err: CliError = DigesterError::credential("forbidden").into();
        assert!(matches!(err, CliError::Kube { .. }));
    }

    #[test]
    fn test_io_error_exit_code() {
        let err: CliError = std::io::Error::new(std::io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.exit_code(), exit_codes::IO_ERROR);
    }
}
