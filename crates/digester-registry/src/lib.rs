//! Digester Registry - resolves image tags to digests over the OCI
//! distribution API
//!
//! [`RegistryDigestResolver`] is the production [`digester_core::DigestResolver`].
//! Registry credentials come from the [`digester_core::CredentialChain`]
//! built for each workload.

pub mod error;
pub mod platform;
pub mod resolver;

pub use error::{RegistryError, Result};
pub use platform::Platform;
pub use resolver::RegistryDigestResolver;
