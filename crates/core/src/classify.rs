//! Failure classification: `FailureCondition` → HTTP status + response body.
//!
//! Rules, in priority order:
//!
//! 1. an explicit status code on the condition is used verbatim
//! 2. `Validation` → 400
//! 3. anything else → 500
//!
//! `NotFound` and `Unauthorized` surface as 4xx only through an explicit
//! status; without one they are treated as server faults.
//!
//! The body label follows the status (`BadRequest` below 500, `ServerError`
//! otherwise). Details are only ever forwarded for validation failures.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{FailureCondition, FailureKind};

/// Message used when a condition carries none.
pub const DEFAULT_MESSAGE: &str = "Internal Server Error";

pub const LABEL_BAD_REQUEST: &str = "BadRequest";
pub const LABEL_SERVER_ERROR: &str = "ServerError";
pub const LABEL_TOO_MANY_REQUESTS: &str = "TooManyRequests";

/// Outward-facing error payload.
///
/// `details` always serializes, as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub details: Option<JsonValue>,
}

/// Result of classifying a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub status: u16,
    pub body: ErrorResponse,
}

/// Classify a failure condition. Pure; no logging happens here.
pub fn classify(condition: &FailureCondition) -> Classification {
    let status = condition
        .status_code()
        .unwrap_or_else(|| default_status(condition.kind()));

    let label = if status < 500 {
        LABEL_BAD_REQUEST
    } else {
        LABEL_SERVER_ERROR
    };

    let details = match condition.kind() {
        FailureKind::Validation => condition.details().cloned(),
        _ => None,
    };

    let message = match condition.message() {
        Some(m) if !m.trim().is_empty() => m.to_string(),
        _ => DEFAULT_MESSAGE.to_string(),
    };

    Classification {
        status,
        body: ErrorResponse {
            error: label.to_string(),
            message,
            details,
        },
    }
}

fn default_status(kind: FailureKind) -> u16 {
    match kind {
        FailureKind::Validation => 400,
        FailureKind::NotFound | FailureKind::Unauthorized | FailureKind::ServerFault => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn validation_maps_to_400_and_keeps_details() {
        let details = json!([{ "field": "email", "message": "is required" }]);
        let c = classify(&FailureCondition::validation("invalid login", details.clone()));

        assert_eq!(c.status, 400);
        assert_eq!(c.body.error, "BadRequest");
        assert_eq!(c.body.message, "invalid login");
        assert_eq!(c.body.details, Some(details));
    }

    #[test]
    fn server_fault_hides_details() {
        let cond = FailureCondition::server_fault("db pool exhausted")
            .with_details(json!({ "driver": "connection reset by peer" }));
        let c = classify(&cond);

        assert_eq!(c.status, 500);
        assert_eq!(c.body.error, "ServerError");
        assert_eq!(c.body.message, "db pool exhausted");
        assert_eq!(c.body.details, None);
    }

    #[test]
    fn explicit_status_overrides_kind() {
        let c = classify(&FailureCondition::unauthorized("not your ride").with_status(403));
        assert_eq!(c.status, 403);
        assert_eq!(c.body.error, "BadRequest");
    }

    #[test]
    fn explicit_5xx_status_is_server_error() {
        let c = classify(&FailureCondition::validation("upstream", json!({})).with_status(502));
        assert_eq!(c.status, 502);
        assert_eq!(c.body.error, "ServerError");
    }

    #[test]
    fn missing_or_blank_message_uses_default() {
        let c = classify(&FailureCondition::new(FailureKind::ServerFault));
        assert_eq!(c.body.message, DEFAULT_MESSAGE);

        let c = classify(&FailureCondition::server_fault("   "));
        assert_eq!(c.body.message, DEFAULT_MESSAGE);
    }

    #[test]
    fn route_not_found_body_matches_wire_shape() {
        let c = classify(&FailureCondition::route_not_found("GET", "/nope"));
        assert_eq!(c.status, 404);
        assert_eq!(
            serde_json::to_value(&c.body).unwrap(),
            json!({
                "error": "BadRequest",
                "message": "Route GET /nope not found",
                "details": null,
            })
        );
    }

    #[test]
    fn non_validation_kinds_default_to_server_error() {
        for cond in [
            FailureCondition::not_found("ride"),
            FailureCondition::unauthorized("who?").with_details(json!({ "token": "expired" })),
        ] {
            let c = classify(&cond);
            assert_eq!(c.status, 500);
            assert_eq!(c.body.error, LABEL_SERVER_ERROR);
            assert_eq!(c.body.details, None);
        }

        assert_eq!(classify(&FailureCondition::not_found("ride").with_status(404)).status, 404);
        assert_eq!(classify(&FailureCondition::unauthorized("who?").with_status(401)).status, 401);
    }

    fn any_json() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            any::<bool>().prop_map(JsonValue::from),
            any::<i64>().prop_map(JsonValue::from),
            ".*".prop_map(JsonValue::from),
            prop::collection::vec(".*", 0..4).prop_map(|v| json!(v)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Validation details survive classification untouched.
        #[test]
        fn validation_details_pass_through(msg in ".*", details in any_json()) {
            let c = classify(&FailureCondition::validation(msg, details.clone()));
            prop_assert_eq!(c.status, 400);
            prop_assert_eq!(c.body.details, Some(details));
        }

        /// Server faults never leak details, whatever they contain.
        #[test]
        fn server_fault_never_leaks(msg in ".*", details in any_json()) {
            let c = classify(&FailureCondition::server_fault(msg).with_details(details));
            prop_assert_eq!(c.status, 500);
            prop_assert_eq!(c.body.error.as_str(), LABEL_SERVER_ERROR);
            prop_assert!(c.body.details.is_none());
        }

        #[test]
        fn override_is_verbatim(status in 100u16..1000) {
            let c = classify(&FailureCondition::unauthorized("x").with_status(status));
            prop_assert_eq!(c.status, status);
        }
    }
}
