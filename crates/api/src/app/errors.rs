use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use ridelink_core::classify::LABEL_TOO_MANY_REQUESTS;
use ridelink_core::{classify, FailureCondition};
use ridelink_infra::Decision;

/// Handler error: a failure condition on its way to classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError(pub FailureCondition);

impl From<FailureCondition> for ApiError {
    fn from(value: FailureCondition) -> Self {
        Self(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(
            FailureCondition::validation(
                "Invalid request body",
                json!([{ "field": "body", "message": rejection.body_text() }]),
            )
            .with_status(rejection.status().as_u16()),
        )
    }
}

/// The raw condition behind an error response, picked up by the failure
/// reporting middleware and removed before the response leaves the service.
#[derive(Debug, Clone)]
pub struct FailureReport(pub Arc<FailureCondition>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let classified = classify(&self.0);
        let status =
            StatusCode::from_u16(classified.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut res = (status, Json(classified.body)).into_response();
        res.extensions_mut().insert(FailureReport(Arc::new(self.0)));
        res
    }
}

/// 429 response for a denied admission decision.
pub fn rate_limited_response(decision: &Decision, message: &str) -> Response {
    let mut res = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "error": LABEL_TOO_MANY_REQUESTS,
            "message": message,
        })),
    )
        .into_response();

    if let Some(secs) = decision.retry_after_secs() {
        res.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    apply_rate_limit_headers(&mut res, decision);
    res
}

pub const RATE_LIMIT_LIMIT: &str = "ratelimit-limit";
pub const RATE_LIMIT_REMAINING: &str = "ratelimit-remaining";

pub fn apply_rate_limit_headers(res: &mut Response, decision: &Decision) {
    let headers = res.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(decision.remaining));
}

/// Turns a handler panic into a classified server fault.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };

    ApiError(FailureCondition::server_fault("Internal Server Error").with_details(json!({ "panic": detail })))
        .into_response()
}
