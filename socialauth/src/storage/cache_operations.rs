//! Typed helpers over the generic cache store.
//!
//! Every module that keeps short-lived state in the cache (sessions, OAuth
//! state, JWKS, used one-time codes) goes through these helpers so the
//! serialization and error conversion are done in one place.

use serde::{Serialize, de::DeserializeOwned};

use crate::storage::{CacheData, GENERIC_CACHE_STORE, StorageError};
use crate::utils::gen_random_string;

const MAX_COLLISION_ATTEMPTS: usize = 3;

/// Trait for converting storage errors to module-specific error types
pub(crate) trait CacheErrorConversion<E> {
    fn convert_storage_error(error: StorageError) -> E;
}

fn to_cache_data<T: Serialize>(data: &T) -> Result<CacheData, StorageError> {
    Ok(CacheData {
        value: serde_json::to_string(data)?,
    })
}

fn ttl_to_usize(ttl: u64) -> Result<usize, StorageError> {
    ttl.try_into().map_err(|_| {
        StorageError::InvalidInput("TTL value too large for storage backend".to_string())
    })
}

/// Store data under an explicit key, replacing any previous value.
pub(crate) async fn store_cache_keyed<T, E>(
    prefix: &str,
    key: &str,
    data: &T,
    ttl: u64,
) -> Result<(), E>
where
    T: Serialize,
    E: CacheErrorConversion<E>,
{
    let cache_data = to_cache_data(data).map_err(E::convert_storage_error)?;
    let ttl = ttl_to_usize(ttl).map_err(E::convert_storage_error)?;

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(prefix, key, cache_data, ttl)
        .await
        .map_err(E::convert_storage_error)
}

/// Store data under a freshly generated random key and return the key.
pub(crate) async fn store_cache_auto<T, E>(prefix: &str, data: &T, ttl: u64) -> Result<String, E>
where
    T: Serialize,
    E: CacheErrorConversion<E>,
{
    let cache_data = to_cache_data(data).map_err(E::convert_storage_error)?;
    let ttl = ttl_to_usize(ttl).map_err(E::convert_storage_error)?;

    for attempt in 1..=MAX_COLLISION_ATTEMPTS {
        let key = gen_random_string(32).map_err(|e| {
            E::convert_storage_error(StorageError::InvalidInput(format!(
                "Key generation failed: {e}"
            )))
        })?;

        let inserted = GENERIC_CACHE_STORE
            .lock()
            .await
            .put_if_not_exists(prefix, &key, cache_data.clone(), ttl)
            .await
            .map_err(E::convert_storage_error)?;

        if inserted {
            return Ok(key);
        }

        tracing::debug!(
            "Collision detected on attempt {} for auto-generated key, retrying...",
            attempt
        );
    }

    Err(E::convert_storage_error(StorageError::InvalidInput(
        format!("Failed to store data after {MAX_COLLISION_ATTEMPTS} collision detection attempts"),
    )))
}

/// Store data only if the key is absent. Returns false when it was already present.
pub(crate) async fn store_cache_if_absent<T, E>(
    prefix: &str,
    key: &str,
    data: &T,
    ttl: u64,
) -> Result<bool, E>
where
    T: Serialize,
    E: CacheErrorConversion<E>,
{
    let cache_data = to_cache_data(data).map_err(E::convert_storage_error)?;
    let ttl = ttl_to_usize(ttl).map_err(E::convert_storage_error)?;

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_if_not_exists(prefix, key, cache_data, ttl)
        .await
        .map_err(E::convert_storage_error)
}

/// Retrieve and deserialize data from the cache.
pub(crate) async fn get_data<T, E>(prefix: &str, key: &str) -> Result<Option<T>, E>
where
    T: DeserializeOwned,
    E: CacheErrorConversion<E>,
{
    let cached = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(prefix, key)
        .await
        .map_err(E::convert_storage_error)?;

    match cached {
        Some(data) => serde_json::from_str(&data.value)
            .map(Some)
            .map_err(|e| E::convert_storage_error(StorageError::from(e))),
        None => Ok(None),
    }
}

/// Remove data from the cache.
pub(crate) async fn remove_data<E>(prefix: &str, key: &str) -> Result<(), E>
where
    E: CacheErrorConversion<E>,
{
    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(prefix, key)
        .await
        .map_err(E::convert_storage_error)
}

/// Retrieve data and remove it, so that it can be consumed only once.
pub(crate) async fn take_data<T, E>(prefix: &str, key: &str) -> Result<Option<T>, E>
where
    T: DeserializeOwned,
    E: CacheErrorConversion<E>,
{
    let data = get_data::<T, E>(prefix, key).await?;
    if data.is_some() {
        remove_data::<E>(prefix, key).await?;
    }
    Ok(data)
}
