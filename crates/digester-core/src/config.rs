//! Engine configuration
//!
//! Configuration is an immutable value handed to the engine at construction
//! time. Transports decide where the values come from (flags, environment,
//! function config); the engine never reads ambient state itself.

use std::time::Duration;

/// Namespace the webhook runs in when none is configured
pub const DEFAULT_OPERATING_NAMESPACE: &str = "digester-system";

/// Ordered set of image prefixes excluded from resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipPrefixSet {
    prefixes: Vec<String>,
}

impl SkipPrefixSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `:` or `;` separated list, dropping empty entries
    ///
    /// ```
    /// use digester_core::SkipPrefixSet;
    ///
    /// let set = SkipPrefixSet::parse("gcr.io/distroless;registry.local:");
    /// assert!(set.matches("gcr.io/distroless/static"));
    /// assert!(set.matches("registry.local/app"));
    /// ```
    pub fn parse(s: &str) -> Self {
        s.split([':', ';'])
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Add a prefix, keeping first-insertion order and ignoring duplicates
    pub fn insert(&mut self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        if !prefix.is_empty() && !self.prefixes.contains(&prefix) {
            self.prefixes.push(prefix);
        }
    }

    /// Exact, unnormalized prefix match
    pub fn matches(&self, image: &str) -> bool {
        self.matching(image).is_some()
    }

    /// The first prefix that matches `image`
    pub fn matching(&self, image: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| image.starts_with(p.as_str()))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.prefixes.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SkipPrefixSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = SkipPrefixSet::new();
        for prefix in iter {
            set.insert(prefix);
        }
        set
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Images starting with any of these prefixes are left verbatim
    pub skip_prefixes: SkipPrefixSet,

    /// OS/architecture constraint passed to the resolver (`None` = resolver default)
    pub platform: Option<String>,

    /// Disable all cluster credential lookups
    pub offline: bool,

    /// Compute patches but never emit them
    pub dry_run: bool,

    /// Turn errored admissions into allowed ones
    pub ignore_errors: bool,

    /// Namespace whose workloads are never mutated
    pub operating_namespace: String,

    /// Deadline for one resolution pass
    pub timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            skip_prefixes: SkipPrefixSet::default(),
            platform: None,
            offline: false,
            dry_run: false,
            ignore_errors: false,
            operating_namespace: DEFAULT_OPERATING_NAMESPACE.to_string(),
            timeout: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip_prefixes(mut self, prefixes: SkipPrefixSet) -> Self {
        self.skip_prefixes = prefixes;
        self
    }

    /// Set the platform; an empty string means "resolver default"
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        let platform = platform.into();
        self.platform = if platform.is_empty() {
            None
        } else {
            Some(platform)
        };
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_ignore_errors(mut self, ignore_errors: bool) -> Self {
        self.ignore_errors = ignore_errors;
        self
    }

    pub fn with_operating_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.operating_namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
