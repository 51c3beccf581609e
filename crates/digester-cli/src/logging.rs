//! Log output setup

use tracing_subscriber::EnvFilter;

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Used when stdout carries the resource stream
    Stderr,
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `debug`, which otherwise selects `debug` over `info`.
pub fn init(debug: bool, target: LogTarget) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = match target {
        LogTarget::Stdout => builder.try_init(),
        LogTarget::Stderr => builder.with_writer(std::io::stderr).try_init(),
    };
    if let Err(e) = installed {
        eprintln!("digester: could not install log subscriber: {}", e);
    }
}
