//! Key-value store access.
//!
//! Routing metadata lives in an external store reached through point reads
//! (`GET` and `HGET`). The [`KvStore`] trait is the seam between the routing
//! logic and the concrete store: production uses the pooled Redis
//! implementation, tests and storeless development use the in-memory one.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),

    #[error("timed out waiting for the store")]
    Timeout,

    #[error("store command failed: {0}")]
    Command(#[from] bb8_redis::redis::RedisError),
}

/// A source of pooled store connections.
///
/// `acquire` checks out one connection for the duration of a single routing
/// resolution; dropping the returned handle releases it back to the pool on
/// every exit path.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn acquire<'a>(&'a self) -> Result<Box<dyn KvConnection + Send + 'a>, StoreError>;
}

/// A checked-out store connection supporting the two point-read shapes the
/// routing chain needs.
#[async_trait]
pub trait KvConnection: Send {
    /// Read a scalar key. `Ok(None)` means the key is absent.
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Read one field of a hash. `Ok(None)` means the key or field is absent.
    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
}
