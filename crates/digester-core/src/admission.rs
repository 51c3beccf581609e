//! Admission request and decision types
//!
//! These are transport-neutral: the webhook converts Kubernetes
//! `AdmissionReview`s into [`AdmissionInput`] and maps the resulting
//! [`AdmissionOutcome`] back onto its own response shape.

use json_patch::PatchOperation;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::DigesterError;

/// Admission operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

impl Operation {
    /// Only creates and updates are ever mutated
    pub fn is_mutating(self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Connect => "CONNECT",
        };
        f.write_str(s)
    }
}

/// What the transport hands the engine for one request
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionInput {
    pub operation: Operation,
    /// Namespace of the request (always set, even when the object omits it)
    pub namespace: String,
    pub name: Option<String>,
    pub kind: Option<String>,
    /// The object as submitted, JSON encoded
    pub raw_object: Vec<u8>,
}

impl AdmissionInput {
    pub fn new(operation: Operation, namespace: impl Into<String>, raw_object: Vec<u8>) -> Self {
        Self {
            operation,
            namespace: namespace.into(),
            name: None,
            kind: None,
            raw_object,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Reason attached to an allowed decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Operation other than create/update
    NoMutationForOperation,
    /// Request targets the digester's own namespace
    NoSelfManagement,
    /// An error occurred but errors are configured to be ignored
    ErrorIgnored,
    /// Nothing to change, or dry-run
    NotPatched,
    Patched,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::NoMutationForOperation => "NoMutationForOperation",
            Reason::NoSelfManagement => "NoSelfManagement",
            Reason::ErrorIgnored => "ErrorIgnored",
            Reason::NotPatched => "NotPatched",
            Reason::Patched => "Patched",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single decision produced for an admission request
#[derive(Debug)]
pub enum AdmissionOutcome {
    AllowedUnchanged {
        reason: Reason,
    },
    AllowedWithPatch {
        reason: Reason,
        operations: Vec<PatchOperation>,
    },
    Denied {
        error: DigesterError,
    },
}

impl AdmissionOutcome {
    pub fn unchanged(reason: Reason) -> Self {
        AdmissionOutcome::AllowedUnchanged { reason }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, AdmissionOutcome::Denied { .. })
    }

    /// Reason for allowed decisions
    pub fn reason(&self) -> Option<Reason> {
        match self {
            AdmissionOutcome::AllowedUnchanged { reason }
            | AdmissionOutcome::AllowedWithPatch { reason, .. } => Some(*reason),
            AdmissionOutcome::Denied { .. } => None,
        }
    }

    /// Emitted patch operations (empty unless patched)
    pub fn operations(&self) -> &[PatchOperation] {
        match self {
            AdmissionOutcome::AllowedWithPatch { operations, .. } => operations,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&DigesterError> {
        match self {
            AdmissionOutcome::Denied { error } => Some(error),
            _ => None,
        }
    }
}
