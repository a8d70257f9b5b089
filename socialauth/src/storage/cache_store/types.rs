use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

pub(crate) struct InMemoryCacheStore {
    pub(super) entry: HashMap<String, (CacheData, Option<DateTime<Utc>>)>,
}

pub(crate) struct RedisCacheStore {
    pub(super) client: redis::Client,
}

#[async_trait]
pub(crate) trait CacheStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Put a value into the store without expiration.
    async fn put(&mut self, prefix: &str, key: &str, value: CacheData)
    -> Result<(), StorageError>;

    /// Put a value into the store with a TTL in seconds.
    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError>;

    /// Get a value from the store. Expired entries are reported as absent.
    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError>;

    /// Remove a value from the store.
    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError>;

    /// Add-if-absent. Returns true if the value was stored, false if the key was taken.
    async fn put_if_not_exists(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<bool, StorageError>;
}
