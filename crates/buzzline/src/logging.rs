//! Tracing subscriber setup for binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events pass the default filter.
const CRATES: [&str; 6] = [
    "buzzline",
    "buzzline_server",
    "buzzline_lobby",
    "buzzline_game",
    "buzzline_transport",
    "buzzline_protocol",
];

/// Default `EnvFilter` directive: `default_level` for every Buzzline crate.
pub fn default_filter(default_level: &str) -> String {
    CRATES
        .iter()
        .map(|name| format!("{name}={default_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs a formatted tracing subscriber.
///
/// `RUST_LOG` overrides the default filter from [`default_filter`].
///
/// # Examples
///
/// ```no_run
/// buzzline::setup_logger("debug");
/// ```
pub fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
