use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};

use crate::storage::errors::StorageError;
use crate::storage::types::CacheData;

use super::types::{CacheStore, RedisCacheStore};

/// Namespace of every key this crate writes
const KEY_NAMESPACE: &str = "socialauth";

impl RedisCacheStore {
    fn make_key(prefix: &str, key: &str) -> String {
        format!("{KEY_NAMESPACE}:{prefix}:{key}")
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn init(&self) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        tracing::debug!("Redis cache store reachable");
        Ok(())
    }

    async fn put(&mut self, prefix: &str, key: &str, value: CacheData) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set(Self::make_key(prefix, key), serde_json::to_string(&value)?)
            .await?;
        Ok(())
    }

    async fn put_with_ttl(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn
            .set_ex(
                Self::make_key(prefix, key),
                serde_json::to_string(&value)?,
                ttl.max(1) as u64,
            )
            .await?;
        Ok(())
    }

    async fn get(&self, prefix: &str, key: &str) -> Result<Option<CacheData>, StorageError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(Self::make_key(prefix, key)).await?;
        Ok(value.map(|v| serde_json::from_str(&v)).transpose()?)
    }

    async fn remove(&mut self, prefix: &str, key: &str) -> Result<(), StorageError> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(Self::make_key(prefix, key)).await?;
        Ok(())
    }

    /// `SET key value NX EX ttl` in one round trip, so a key never lingers
    /// without its expiry.
    async fn put_if_not_exists(
        &mut self,
        prefix: &str,
        key: &str,
        value: CacheData,
        ttl: usize,
    ) -> Result<bool, StorageError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(Self::make_key(prefix, key))
            .arg(serde_json::to_string(&value)?)
            .arg("NX");
        if ttl > 0 {
            cmd.arg("EX").arg(ttl);
        }
        let stored: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(stored.is_some())
    }
}
