//! Tracing initialization
//!
//! Configures the global `tracing` subscriber from `LOG_LEVEL` and
//! `LOG_FORMAT` (json or plain). JSON output is what the deployment's
//! log shipper expects; plain is for local development.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// Falls back to `info` when `LOG_LEVEL`/`RUST_LOG` are unset or invalid.
/// Safe to call once at startup; a second call is a no-op error that is
/// swallowed so tests can initialize independently.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            EnvFilter::try_new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()))
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        let _ = fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_target(true)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).with_target(true).try_init();
    }
}
