//! Tracing/logging initialization.
//!
//! One JSON object per line. Request spans from the HTTP trace layer are
//! emitted at `debug`, so the default filter lifts `tower_http` to that level.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::SystemTime;

/// Filter used when `RUST_LOG` is unset, blank or unparsable.
pub const DEFAULT_FILTER: &str = "info,tower_http=debug";

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from(directives.as_deref()))
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_timer(SystemTime)
        .with_target(false)
        .try_init();
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
