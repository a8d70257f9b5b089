use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

/// Authenticators table name
pub(super) static DB_TABLE_AUTHENTICATORS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_AUTHENTICATORS")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "authenticators"))
});
