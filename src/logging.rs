//! Tracing subscriber setup for the binaries
//!
//! `RUST_LOG` wins when set; otherwise `info`, or `debug` when verbose.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    })
}

/// Install the global subscriber
pub fn init(verbose: bool) {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();
}

/// Like [`init`], but tolerates an existing subscriber and writes through
/// the test harness
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(filter(true))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
