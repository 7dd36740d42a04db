//! Tracing subscriber initialization.
//!
//! Logs are JSON lines with system-time timestamps; the filter comes from
//! `RUST_LOG` and falls back to the given default directive.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Initialize tracing with the `info` default.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default(DEFAULT_DIRECTIVE);
}

/// Initialize tracing with a host-chosen default directive, e.g.
/// `"erpbot_agent=debug,info"`.
pub fn init_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        ::tracing::debug!(default_directive = directive, "tracing initialized");
    }
}
