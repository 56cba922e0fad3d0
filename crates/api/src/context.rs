use ridelink_core::ClientKey;

/// Authenticated caller identity.
///
/// Inserted into request extensions by whatever authenticates the request
/// (not part of this service). When present it takes precedence over the
/// network address for rate-limit bucketing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedClient(pub String);

/// Rate-limit bucket of the current request.
///
/// Present on every request that passed the limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    key: ClientKey,
}

impl ClientContext {
    pub fn new(key: ClientKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &ClientKey {
        &self.key
    }
}
