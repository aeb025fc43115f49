//! Tracing setup and log-safe helpers

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use siilink_common::cache::sha256_hex;

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init().is_ok(),
        LogFormat::Json => {
            registry.with(tracing_subscriber::fmt::layer().json()).try_init().is_ok()
        }
    }
}

/// Short, non-reversible fingerprint of a secret for log fields.
pub fn fingerprint(secret: &str) -> String {
    sha256_hex(secret).chars().take(8).collect()
}
