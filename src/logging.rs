//! Tracing subscriber setup for hosts embedding the orchestrator.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "autotrainer=debug,tower_http=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.into()))
}

/// Initialize tracing with output to stderr or stdout.
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing(use_stderr: bool) {
    if use_stderr {
        // Keep stdout clean for hosts that use it as a data channel
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Like [`init_tracing`] writing to the test writer, but a no-op when a
/// subscriber is already installed. Returns whether this call installed it.
pub fn try_init_tracing() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}
