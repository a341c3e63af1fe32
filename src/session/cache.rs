//! Per-client fallback cache of session identifiers.

use dashmap::DashMap;
use std::net::IpAddr;

/// Maps client address to the most recently seen session identifier.
///
/// Populated opportunistically when a request carries an explicit session
/// cookie; consulted only when one does not. Entries live for the process
/// lifetime; there is no eviction.
#[derive(Default)]
pub struct SessionCache {
    inner: DashMap<IpAddr, String>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the session identifier for a client, replacing any prior entry.
    pub fn insert(&self, client: IpAddr, session_id: impl Into<String>) {
        self.inner.insert(client, session_id.into());
    }

    /// The last session identifier seen for a client, if any.
    pub fn get(&self, client: &IpAddr) -> Option<String> {
        self.inner.get(client).map(|id| id.value().clone())
    }

    /// Number of cached client addresses.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
