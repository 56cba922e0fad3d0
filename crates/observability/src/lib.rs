//! Tracing, logging and failure reporting (shared setup).

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Failure sink port and its tracing-backed implementation.
pub mod failures;

pub use failures::{FailureContext, FailureSink, TracingFailureSink};
