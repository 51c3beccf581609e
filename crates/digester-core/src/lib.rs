//! Digester Core - pins container images in Kubernetes workloads to digests
//!
//! This crate holds the transport-independent engine:
//! - `WorkloadTree`: schema-less view of one resource
//! - `WorkloadShape` and the path catalog: where container lists live
//! - `CredentialChain`: registry credentials derived from the workload
//! - `DigestResolver`: the registry capability, injected by the caller
//! - `Digester`: admission decisions and in-place resolution

pub mod admission;
pub mod catalog;
pub mod config;
pub mod docker_config;
pub mod engine;
pub mod error;
pub mod keychain;
pub mod mock;
pub mod patch;
pub mod reference;
pub mod resolve;
pub mod tree;
pub mod walker;

pub use admission::{AdmissionInput, AdmissionOutcome, Operation, Reason};
pub use catalog::{ContainerListKind, ContainerListPath, WorkloadShape};
pub use config::{DEFAULT_OPERATING_NAMESPACE, EngineConfig, SkipPrefixSet};
pub use docker_config::{DockerConfig, RegistryCredential};
pub use engine::{Digester, DigesterBuilder};
pub use error::{DigesterError, Result};
pub use keychain::{CredentialChain, CredentialProvider, CredentialStore};
pub use reference::ImageReference;
pub use resolve::{DigestResolver, FilterDecision, ImageTagFilter, ResolvedImage};
pub use tree::{TreePath, WorkloadTree};
pub use walker::ContainerRef;
