use axum::{
    extract::{rejection::JsonRejection, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use ridelink_core::FailureCondition;

use crate::app::dto::RideRequest;
use crate::app::errors::ApiError;
use crate::app::routes::route_not_found;

pub fn router() -> Router {
    Router::new()
        .route("/", post(request_ride).fallback(route_not_found))
        .route("/:id", get(get_ride).fallback(route_not_found))
}

/// Accepts a ride request for matching. Matching itself happens elsewhere.
pub async fn request_ride(
    body: Result<Json<RideRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let ride = body.validate()?;
    Ok((StatusCode::ACCEPTED, Json(ride)))
}

/// No ride store is wired into this service, so every lookup misses.
pub async fn get_ride(Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    Err(FailureCondition::not_found(format!("Ride {id} not found"))
        .with_status(404)
        .into())
}
