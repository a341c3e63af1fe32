//! Request identifiers for log correlation.
//!
//! Two id shapes serve two scopes: each accepted connection gets a cheap
//! counter-based id that tags every log line the connection produces, and
//! each proxied request carries a UUID that is forwarded to the backend in
//! `x-request-id`. A request id the client already sent is reused unchanged
//! so the id survives across proxy hops.

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counter for connection-scoped ids.
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new UUID-based request ID.
pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a short request ID based on a counter.
///
/// Faster than a UUID but only unique within a single process; used for
/// connection-scoped correlation. Format: `req-{counter}` with the counter
/// zero-padded to 16 hex digits.
pub fn generate_short_request_id() -> String {
    let count = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("req-{:016x}", count)
}

/// An identifier attached to log lines and the forwarded `x-request-id`.
#[derive(Clone, Debug)]
pub struct RequestId(String);

impl RequestId {
    /// Mint a fresh UUID request ID.
    pub fn new() -> Self {
        Self(generate_request_id())
    }

    /// Mint a short connection-scoped ID.
    pub fn short() -> Self {
        Self(generate_short_request_id())
    }

    /// Adopt an ID the client already sent in `x-request-id`.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the request ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
