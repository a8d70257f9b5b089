use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, InMemoryCacheStore};

const CACHE_PREFIX: &str = "cache";

impl InMemoryCacheStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Creating new in-memory generic cache store");
        Self {
            entry: HashMap::new(),
        }
    }

    fn make_key(prefix: &str, key: &str) -> String {
        format!("{CACHE_PREFIX}:{prefix}:{key}")
    }

    fn is_live(&self, key: &str) -> bool {
        match self.entry.get(key) {
            Some((_, Some(expires_at))) => *expires_at > Utc::now(),
            Some((_, None)) => true,
            None => false,
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn put(&mut self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.insert(key, (value, None));
        Ok(())
    }

    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        let expires_at = Utc::now() + Duration::seconds(ttl as i64);
        self.entry.insert(key, (value, Some(expires_at)));
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let key = Self::make_key(prefix, key);
        if !self.is_live(&key) {
            return Ok(None);
        }
        Ok(self.entry.get(&key).map(|(value, _)| value.clone()))
    }

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let key = Self::make_key(prefix, key);
        self.entry.remove(&key);
        Ok(())
    }

    async fn put_if_not_exists(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<bool, StorageError> {
        let full_key = Self::make_key(prefix, key);
        if self.is_live(&full_key) {
            return Ok(false);
        }
        let expires_at = (ttl > 0).then(|| Utc::now() + Duration::seconds(ttl as i64));
        self.entry.insert(full_key, (value, expires_at));
        Ok(true)
    }
}
