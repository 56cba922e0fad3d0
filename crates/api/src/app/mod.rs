//! HTTP application wiring (Axum router + request-governance layers).
//!
//! Layers, outermost first:
//!
//! ```text
//! SetRequestId → PropagateRequestId → Trace → CORS
//!   → failure reporting → CatchPanic
//!     → /health
//!     → /api/auth/*   (login rate limiter on the POST handlers)
//!     → /api/rides/*
//!     → fallback: "Route {METHOD} {path} not found"
//! ```
//!
//! - `dto.rs`: request/response DTOs and field validation
//! - `errors.rs`: `ApiError` and the error/429 response shapes
//! - `routes/`: handlers, one file per area

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use ridelink_infra::{GovernanceConfig, RateLimiter};
use ridelink_observability::{FailureSink, TracingFailureSink};

use crate::middleware::{self, MakeRequestUuidV7, RateLimitState};

pub mod dto;
pub mod errors;
pub mod routes;

/// Shared governance components, built once at startup.
#[derive(Clone)]
pub struct Governance {
    pub login_limit: RateLimitState,
    pub failure_sink: Arc<dyn FailureSink>,
}

impl Governance {
    pub fn from_config(config: &GovernanceConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limiter_config()));
        let mut login_limit = RateLimitState::new(limiter);
        if config.trust_proxy_headers {
            login_limit = login_limit.trusting_proxy_headers();
        }
        Self {
            login_limit,
            failure_sink: Arc::new(TracingFailureSink),
        }
    }

    pub fn with_failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.failure_sink = sink;
        self
    }

    pub fn login_limiter(&self) -> &Arc<RateLimiter> {
        &self.login_limit.limiter
    }
}

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &GovernanceConfig, governance: Governance) -> Router {
    let request_id = axum::http::HeaderName::from_static(middleware::REQUEST_ID_HEADER);

    Router::new()
        .merge(routes::system_router())
        .nest("/api", routes::router(governance.login_limit.clone()))
        .fallback(routes::route_not_found)
        .layer(CatchPanicLayer::custom(errors::panic_response))
        .layer(axum::middleware::from_fn_with_state(
            governance.failure_sink.clone(),
            middleware::failure_reporting_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuidV7))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(config)),
        )
}

fn build_cors_layer(config: &GovernanceConfig) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        header::HeaderName::from_static(middleware::REQUEST_ID_HEADER),
    ];

    if config.allows_any_origin() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(headers);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
}
