//! Pooled Redis implementation of the store seam.
//!
//! The pool keeps at most `max_idle` connections, drops them after the idle
//! timeout, and pings each connection before handing it out so a stale
//! connection is transparently replaced by a fresh dial.

use crate::config::StoreConfig;
use crate::store::{KvConnection, KvStore, StoreError};
use async_trait::async_trait;
use bb8_redis::bb8::{Pool, PooledConnection, RunError};
use bb8_redis::{redis, RedisConnectionManager};
use std::time::Duration;
use tracing::debug;

/// Redis-backed [`KvStore`].
pub struct RedisStore {
    pool: Pool<RedisConnectionManager>,
    read_timeout: Duration,
}

impl RedisStore {
    /// Build the connection pool for the configured store.
    ///
    /// No connection is dialed up front; the first checkout establishes one.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let manager = RedisConnectionManager::new(config.url().as_str())?;

        let pool = Pool::builder()
            .max_size(config.max_idle)
            .idle_timeout(Some(config.idle_timeout))
            .connection_timeout(config.connect_timeout)
            .test_on_check_out(true)
            .build(manager)
            .await?;

        Ok(Self {
            pool,
            read_timeout: config.read_timeout,
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn acquire<'a>(&'a self) -> Result<Box<dyn KvConnection + Send + 'a>, StoreError> {
        let conn = self.pool.get().await.map_err(checkout_error)?;

        let state = self.pool.state();
        debug!(
            connections = state.connections,
            idle = state.idle_connections,
            "store connection acquired from pool"
        );

        Ok(Box::new(RedisStoreConn {
            conn,
            read_timeout: self.read_timeout,
        }))
    }
}

/// Map a pool checkout failure onto the store error taxonomy. A failed dial
/// or liveness check is a connection failure, not a command failure.
fn checkout_error(e: RunError<redis::RedisError>) -> StoreError {
    match e {
        RunError::User(err) => StoreError::Connection(err.to_string()),
        RunError::TimedOut => StoreError::Timeout,
    }
}

/// One pooled connection; released back to the pool when dropped.
struct RedisStoreConn<'a> {
    conn: PooledConnection<'a, RedisConnectionManager>,
    read_timeout: Duration,
}

impl RedisStoreConn<'_> {
    async fn query(&mut self, cmd: redis::Cmd) -> Result<Option<String>, StoreError> {
        let fut = async {
            let value: Option<String> = cmd.query_async(&mut *self.conn).await?;
            Ok(value)
        };

        match tokio::time::timeout(self.read_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        }
    }
}

#[async_trait]
impl KvConnection for RedisStoreConn<'_> {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(cmd).await
    }

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut cmd = redis::cmd("HGET");
        cmd.arg(key).arg(field);
        self.query(cmd).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use std::time::Duration;

    #[test]
    fn test_pool_settings_from_config() {
        // The pool is parameterised entirely by StoreConfig; the defaults are
        // the contract (3 idle connections, 240s idle timeout).
        let config = StoreConfig::default();
        assert_eq!(config.max_idle, 3);
        assert_eq!(config.idle_timeout, Duration::from_secs(240));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_checkout_error_mapping() {
        let dial_failure = redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        ));
        assert!(matches!(
            checkout_error(RunError::User(dial_failure)),
            StoreError::Connection(_)
        ));

        assert!(matches!(
            checkout_error(RunError::TimedOut),
            StoreError::Timeout
        ));
    }

    #[test]
    fn test_url_carries_password() {
        let config = StoreConfig {
            password: Some("secret".to_string()),
            ..StoreConfig::default()
        };
        assert_eq!(config.url(), "redis://:secret@127.0.0.1:6379/");
    }
}
