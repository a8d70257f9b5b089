use std::{env, sync::LazyLock};
use tokio::sync::Mutex;

use super::types::DataStore;

/// Relational store shared by all modules. Configured with
/// `GENERIC_DATA_STORE_TYPE` (`sqlite` or `postgres`) and `GENERIC_DATA_STORE_URL`.
pub(crate) static GENERIC_DATA_STORE: LazyLock<Mutex<DataStore>> = LazyLock::new(|| {
    let kind = env::var("GENERIC_DATA_STORE_TYPE").expect("GENERIC_DATA_STORE_TYPE must be set");
    let url = env::var("GENERIC_DATA_STORE_URL").expect("GENERIC_DATA_STORE_URL must be set");

    let store = DataStore::connect_lazy(&kind, &url).unwrap_or_else(|e| {
        tracing::error!("Failed to configure data store: {}", e);
        panic!("{e}");
    });
    tracing::info!(kind = store.kind(), "Data store ready");

    Mutex::new(store)
});

/// Prefix of every table name
pub(crate) static DB_TABLE_PREFIX: LazyLock<String> =
    LazyLock::new(|| env::var("DB_TABLE_PREFIX").unwrap_or_else(|_| "sa_".to_string()));
