//! Operator-facing sink for raw failure conditions.
//!
//! Clients only ever see the classified body. The untouched condition,
//! including server-fault details, is handed to a `FailureSink` first.

use std::sync::Arc;

use ridelink_core::FailureCondition;

/// Where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureContext<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub request_id: Option<&'a str>,
    /// Status the client received.
    pub status: u16,
}

/// Receives every raw failure before it is discarded.
pub trait FailureSink: Send + Sync {
    fn record(&self, condition: &FailureCondition, ctx: &FailureContext<'_>);
}

impl<S> FailureSink for Arc<S>
where
    S: FailureSink + ?Sized,
{
    fn record(&self, condition: &FailureCondition, ctx: &FailureContext<'_>) {
        (**self).record(condition, ctx)
    }
}

/// Logs failures through `tracing`: `warn` for client errors, `error` for server errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingFailureSink;

impl FailureSink for TracingFailureSink {
    fn record(&self, condition: &FailureCondition, ctx: &FailureContext<'_>) {
        let details = condition.details().map(|d| d.to_string());
        if ctx.status >= 500 {
            tracing::error!(
                method = ctx.method,
                path = ctx.path,
                request_id = ctx.request_id,
                status = ctx.status,
                kind = %condition.kind(),
                details = details.as_deref(),
                "request failed: {}",
                condition.message().unwrap_or("<no message>")
            );
        } else {
            tracing::warn!(
                method = ctx.method,
                path = ctx.path,
                request_id = ctx.request_id,
                status = ctx.status,
                kind = %condition.kind(),
                details = details.as_deref(),
                "request rejected: {}",
                condition.message().unwrap_or("<no message>")
            );
        }
    }
}
