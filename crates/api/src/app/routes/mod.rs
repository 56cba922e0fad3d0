use axum::{
    extract::OriginalUri,
    http::Method,
    routing::get,
    Router,
};

use ridelink_core::FailureCondition;

use crate::app::errors::ApiError;
use crate::middleware::RateLimitState;

pub mod auth;
pub mod rides;
pub mod system;

/// Router for every `/api` endpoint.
pub fn router(login_limit: RateLimitState) -> Router {
    Router::new()
        .nest("/auth", auth::router(login_limit))
        .nest("/rides", rides::router())
}

/// Top-level routes that sit outside `/api`.
pub fn system_router() -> Router {
    Router::new().route("/health", get(system::health).fallback(route_not_found))
}

/// Responder for any method + path without a handler.
///
/// `OriginalUri` keeps the full path when called from a nested router.
pub async fn route_not_found(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    FailureCondition::route_not_found(method.as_str(), uri.path()).into()
}
