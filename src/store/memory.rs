//! In-memory implementation of the store seam.
//!
//! Used by tests and by local development setups that have no store to talk
//! to. Behaves like the real store for the two read shapes: absent keys read
//! as `None`, never as errors.

use crate::store::{KvConnection, KvStore, StoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory [`KvStore`] backed by concurrent maps.
#[derive(Clone, Default)]
pub struct MemoryStore {
    strings: Arc<DashMap<String, String>>,
    hashes: Arc<DashMap<String, HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a scalar key.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.strings.insert(key.into(), value.into());
    }

    /// Set one field of a hash.
    pub fn hset(
        &self,
        key: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.hashes
            .entry(key.into())
            .or_default()
            .insert(field.into(), value.into());
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn acquire<'a>(&'a self) -> Result<Box<dyn KvConnection + Send + 'a>, StoreError> {
        Ok(Box::new(MemoryConn {
            strings: Arc::clone(&self.strings),
            hashes: Arc::clone(&self.hashes),
        }))
    }
}

struct MemoryConn {
    strings: Arc<DashMap<String, String>>,
    hashes: Arc<DashMap<String, HashMap<String, String>>>,
}

#[async_trait]
impl KvConnection for MemoryConn {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.strings.get(key).map(|v| v.value().clone()))
    }

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_and_hget() {
        let store = MemoryStore::new();
        store.set("subgrid:1:loaded_model_type", "3di");
        store.hset("session_to_subgrid_id", "abc", "subgrid:1");

        let mut conn = store.acquire().await.unwrap();

        assert_eq!(
            conn.get("subgrid:1:loaded_model_type").await.unwrap(),
            Some("3di".to_string())
        );
        assert_eq!(
            conn.hget("session_to_subgrid_id", "abc").await.unwrap(),
            Some("subgrid:1".to_string())
        );
    }

    #[tokio::test]
    async fn test_absent_keys_read_as_none() {
        let store = MemoryStore::new();
        let mut conn = store.acquire().await.unwrap();

        assert_eq!(conn.get("missing").await.unwrap(), None);
        assert_eq!(conn.hget("missing", "field").await.unwrap(), None);

        store.hset("h", "a", "1");
        assert_eq!(conn.hget("h", "b").await.unwrap(), None);
    }
}
