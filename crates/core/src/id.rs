//! Identifiers used by request governance.

use serde::{Deserialize, Serialize};

/// Rate-limit bucket key.
///
/// Derived deterministically from request metadata: the authenticated
/// identity when one is known, otherwise the client network address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Key used when nothing identifies the caller.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for ClientKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ClientKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ClientKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for ClientKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
