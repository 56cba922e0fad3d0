use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;

use crate::app::dto::{LoginRequest, RegisterRequest};
use crate::app::errors::ApiError;
use crate::app::routes::route_not_found;
use crate::context::ClientContext;
use crate::middleware::{rate_limit_middleware, RateLimitState};

/// Login/registration routes. Only the registered handlers sit behind the
/// login limiter; unsupported methods answer 404 without spending budget.
pub fn router(rate_limit: RateLimitState) -> Router {
    use axum::middleware::from_fn_with_state;

    Router::new()
        .route(
            "/login",
            post(login)
                .route_layer(from_fn_with_state(rate_limit.clone(), rate_limit_middleware))
                .fallback(route_not_found),
        )
        .route(
            "/register",
            post(register)
                .route_layer(from_fn_with_state(rate_limit, rate_limit_middleware))
                .fallback(route_not_found),
        )
}

pub async fn login(
    Extension(client): Extension<ClientContext>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let email = body.validate()?;

    tracing::info!(client_key = %client.key(), "login attempt accepted");

    Ok(Json(json!({
        "status": "accepted",
        "email": email,
    })))
}

pub async fn register(
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let account = body.validate()?;
    Ok((StatusCode::CREATED, Json(account)))
}
