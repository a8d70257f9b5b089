mod config;
mod memory;
mod redis;
mod types;

pub(crate) use config::GENERIC_CACHE_STORE;
// InMemoryCacheStore is only exported for tests
#[cfg(test)]
pub(crate) use types::InMemoryCacheStore;
