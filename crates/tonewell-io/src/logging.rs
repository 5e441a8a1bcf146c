//! Process-wide `tracing` subscriber.

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset or invalid.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case nothing changes.
pub fn init(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!(default_filter, "logging initialised");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_noop() {
        // the first call may lose to another test in this binary
        let _ = init("debug");
        assert!(!init("info"));
    }

    #[test]
    fn test_bad_filter_falls_back() {
        let _ = init("[[not a directive");
        assert!(!init("also ] bad"));
    }
}
