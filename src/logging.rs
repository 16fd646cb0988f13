//! Tracing setup for harness-driven tests

use tracing_subscriber::EnvFilter;

use crate::config::HarnessConfig;

/// Install a `fmt` subscriber filtered at `level`.
///
/// `RUST_LOG` takes precedence when set. Safe to call from every test: only
/// the first successful call installs a subscriber, later ones return
/// `false`.
pub fn init_tracing(level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

/// [`init_tracing`] at the configured `log_level`
pub fn init_from_config(config: &HarnessConfig) -> bool {
    init_tracing(&config.log_level)
}
