use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use ridelink_core::ClientKey;
use ridelink_infra::RateLimiter;
use ridelink_observability::{FailureContext, FailureSink};

use crate::app::errors::{apply_rate_limit_headers, rate_limited_response, FailureReport};
use crate::context::{AuthenticatedClient, ClientContext};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Derives the rate-limit bucket from a request.
pub type KeyFn = Arc<dyn Fn(&Request) -> ClientKey + Send + Sync>;

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub key_fn: KeyFn,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            key_fn: Arc::new(default_client_key),
        }
    }

    /// Key clients by proxy headers instead of the peer address.
    pub fn trusting_proxy_headers(self) -> Self {
        self.with_key_fn(Arc::new(proxied_client_key))
    }

    pub fn with_key_fn(mut self, key_fn: KeyFn) -> Self {
        self.key_fn = key_fn;
        self
    }
}

/// Admission check in front of a route group.
///
/// Denied requests never reach the handler. Admitted ones are counted even
/// if the client goes away before the response is written.
pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    mut req: Request,
    next: Next,
) -> Response {
    let key = (state.key_fn)(&req);
    let decision = state.limiter.check(&key);

    if !decision.allowed {
        return rate_limited_response(&decision, state.limiter.denial_message());
    }

    req.extensions_mut().insert(ClientContext::new(key));
    let mut res = next.run(req).await;
    apply_rate_limit_headers(&mut res, &decision);
    res
}

/// Hands the raw condition behind any error response to the failure sink.
pub async fn failure_reporting_middleware(
    State(sink): State<Arc<dyn FailureSink>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut res = next.run(req).await;

    if let Some(FailureReport(condition)) = res.extensions_mut().remove::<FailureReport>() {
        sink.record(
            &condition,
            &FailureContext {
                method: method.as_str(),
                path: &path,
                request_id: request_id.as_deref(),
                status: res.status().as_u16(),
            },
        );
    }

    res
}

/// Default key: authenticated identity, then the connected peer address.
///
/// Forwarded headers are ignored; any caller can set them.
pub fn default_client_key(req: &Request) -> ClientKey {
    key_for(req, false)
}

/// Like [`default_client_key`], but prefers `X-Forwarded-For` / `X-Real-IP`.
/// For deployments behind a proxy that overwrites those headers.
pub fn proxied_client_key(req: &Request) -> ClientKey {
    key_for(req, true)
}

fn key_for(req: &Request, trust_proxy_headers: bool) -> ClientKey {
    if let Some(AuthenticatedClient(id)) = req.extensions().get::<AuthenticatedClient>() {
        return ClientKey::new(format!("user:{id}"));
    }

    let addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    client_key_from(addr, req.headers(), trust_proxy_headers)
}

/// Client key from the network origin of a request.
pub fn client_key_from(
    addr: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_proxy_headers: bool,
) -> ClientKey {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_client(headers) {
            return ClientKey::new(ip);
        }
    }

    addr.map(|a| ClientKey::new(a.ip().to_string()))
        .unwrap_or_else(ClientKey::unknown)
}

fn forwarded_client(headers: &HeaderMap) -> Option<&str> {
    // X-Forwarded-For: first hop is the original client.
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next());

    forwarded_for
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

/// Time-ordered request ids for callers that did not send one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::now_v7().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}
