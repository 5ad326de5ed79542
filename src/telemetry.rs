//! Tracing setup for the binary.

use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Install the global subscriber, writing to stderr so stdout stays
/// machine-readable. Safe to call more than once.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing(json: bool) {
    INIT.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        if json {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .with(env_filter)
                .init();
        } else {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .init();
        }

        tracing::debug!(json, "Tracing initialized");
    });
}
