//! Failure model shared by every request handler.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Result type used by request handlers and their collaborators.
pub type FailureResult<T> = Result<T, FailureCondition>;

/// Failure taxonomy.
///
/// Rate-limit denial is not a failure; it is reported as an admission decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The client supplied malformed or invalid input.
    Validation,
    /// No such resource (or no such route).
    NotFound,
    /// The caller is not allowed to do this.
    Unauthorized,
    /// Unexpected internal condition. Details never reach the client.
    ServerFault,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::NotFound => "not_found",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::ServerFault => "server_fault",
        }
    }
}

impl core::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raised failure, independent of transport encoding.
///
/// Built once by whoever detects the failure and consumed by classification.
/// The builder methods take `self` so a condition is never mutated after it
/// has been handed off.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{kind}: {}", .message.as_deref().unwrap_or("<no message>"))]
pub struct FailureCondition {
    kind: FailureKind,
    message: Option<String>,
    details: Option<JsonValue>,
    status_code: Option<u16>,
}

impl FailureCondition {
    pub fn new(kind: FailureKind) -> Self {
        Self {
            kind,
            message: None,
            details: None,
            status_code: None,
        }
    }

    /// Invalid client input; `details` is passed through to the response body.
    pub fn validation(msg: impl Into<String>, details: JsonValue) -> Self {
        Self::new(FailureKind::Validation)
            .with_message(msg)
            .with_details(details)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound).with_message(msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(FailureKind::Unauthorized).with_message(msg)
    }

    pub fn server_fault(msg: impl Into<String>) -> Self {
        Self::new(FailureKind::ServerFault).with_message(msg)
    }

    /// Synthesized when no handler is registered for `method` + `path`.
    pub fn route_not_found(method: &str, path: &str) -> Self {
        Self::not_found(format!("Route {method} {path} not found")).with_status(404)
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    /// Explicit status override; takes precedence over the kind-based default.
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn details(&self) -> Option<&JsonValue> {
        self.details.as_ref()
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn route_not_found_formats_method_and_path() {
        let c = FailureCondition::route_not_found("GET", "/nope");
        assert_eq!(c.kind(), FailureKind::NotFound);
        assert_eq!(c.message(), Some("Route GET /nope not found"));
        assert_eq!(c.status_code(), Some(404));
    }

    #[test]
    fn display_includes_kind_and_message() {
        let c = FailureCondition::validation("email is required", json!([]));
        assert_eq!(c.to_string(), "validation: email is required");

        let bare = FailureCondition::new(FailureKind::ServerFault);
        assert_eq!(bare.to_string(), "server_fault: <no message>");
    }
}
