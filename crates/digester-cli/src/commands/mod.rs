//! CLI commands

pub mod function;
pub mod version;
pub mod webhook;

use std::time::Duration;

use digester_core::{EngineConfig, SkipPrefixSet};

/// Engine settings shared by both transports
pub fn engine_config(
    skip_prefixes: Option<&str>,
    platform: Option<&str>,
    offline: bool,
) -> EngineConfig {
    let mut config = EngineConfig::default()
        .with_skip_prefixes(skip_prefixes.map(SkipPrefixSet::parse).unwrap_or_default())
        .with_offline(offline);
    if let Some(platform) = platform {
        config = config.with_platform(platform);
    }
    config
}

/// Timeout from a seconds flag; zero disables it
pub fn timeout(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

/// First entry of a `:` or `;` separated kubeconfig list
pub fn first_kubeconfig(list: &str) -> Option<&str> {
    list.split([':', ';']).find(|entry| !entry.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_kubeconfig() {
        assert_eq!(first_kubeconfig("/a/config:/b/config"), Some("/a/config"));
        assert_eq!(first_kubeconfig(";/b/config"), Some("/b/config"));
        assert_eq!(first_kubeconfig(""), None);
    }

    #[test]
    fn test_timeout_zero_disables() {
        assert_eq!(timeout(0), None);
        assert_eq!(timeout(10), Some(Duration::from_secs(10)));
    }
}
