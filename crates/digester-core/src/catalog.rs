//! Where container lists live, per workload shape

use std::fmt;

/// Structural convention that decides where container lists are found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadShape {
    /// Bare pod: `spec.containers`
    Pod,
    /// Controller embedding a pod template: `spec.template.spec.containers`
    TemplatedWorkload,
    /// Controller embedding a job template: `spec.jobTemplate.spec.template.spec.containers`
    CronJobLikeWorkload,
}

impl WorkloadShape {
    /// Select the shape from a declared `kind`
    ///
    /// Unknown or missing kinds fall back to [`WorkloadShape::TemplatedWorkload`].
    pub fn from_kind(kind: Option<&str>) -> Self {
        match kind {
            Some("CronJob") => WorkloadShape::CronJobLikeWorkload,
            Some("Pod") => WorkloadShape::Pod,
            _ => WorkloadShape::TemplatedWorkload,
        }
    }

    /// Container-list paths to examine, in evaluation order
    pub fn paths(self) -> &'static [ContainerListPath] {
        match self {
            // Bare and templated lookups both run: a pod-template-bearing
            // resource may still carry direct containers, and vice versa.
            WorkloadShape::Pod | WorkloadShape::TemplatedWorkload => DIRECT_THEN_TEMPLATED,
            WorkloadShape::CronJobLikeWorkload => NESTED_TEMPLATE,
        }
    }
}

/// Which container list an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerListKind {
    Containers,
    InitContainers,
}

impl ContainerListKind {
    /// Field name in the pod spec
    pub fn field(self) -> &'static str {
        match self {
            ContainerListKind::Containers => "containers",
            ContainerListKind::InitContainers => "initContainers",
        }
    }
}

impl fmt::Display for ContainerListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// A path (as mapping keys) to a container list, with the list's kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerListPath {
    pub keys: &'static [&'static str],
    pub kind: ContainerListKind,
}

const fn list(keys: &'static [&'static str], kind: ContainerListKind) -> ContainerListPath {
    ContainerListPath { keys, kind }
}

static DIRECT_THEN_TEMPLATED: &[ContainerListPath] = &[
    list(&["spec", "containers"], ContainerListKind::Containers),
    list(&["spec", "initContainers"], ContainerListKind::InitContainers),
    list(
        &["spec", "template", "spec", "containers"],
        ContainerListKind::Containers,
    ),
    list(
        &["spec", "template", "spec", "initContainers"],
        ContainerListKind::InitContainers,
    ),
];

static NESTED_TEMPLATE: &[ContainerListPath] = &[
    list(
        &["spec", "jobTemplate", "spec", "template", "spec", "containers"],
        ContainerListKind::Containers,
    ),
    list(
        &["spec", "jobTemplate", "spec", "template", "spec", "initContainers"],
        ContainerListKind::InitContainers,
    ),
];
