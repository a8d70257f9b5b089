mod cache_operations;
mod cache_store;
mod data_store;
mod errors;
mod schema_validation;
mod types;

pub(crate) async fn init() -> Result<(), StorageError> {
    let _ = *cache_store::GENERIC_CACHE_STORE;
    let _ = *data_store::GENERIC_DATA_STORE;

    Ok(())
}

pub(crate) use cache_operations::{
    CacheErrorConversion, get_data, remove_data, store_cache_auto, store_cache_if_absent,
    store_cache_keyed, take_data,
};
pub(crate) use cache_store::GENERIC_CACHE_STORE;
pub(crate) use data_store::{DB_TABLE_PREFIX, GENERIC_DATA_STORE};
pub(crate) use errors::StorageError;
pub(crate) use schema_validation::{validate_postgres_table_schema, validate_sqlite_table_schema};
pub use types::CacheData;

#[cfg(test)]
pub(crate) use cache_store::InMemoryCacheStore;
