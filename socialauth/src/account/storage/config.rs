use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

/// Email addresses table name
pub(super) static DB_TABLE_EMAIL_ADDRESSES: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_EMAIL_ADDRESSES")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "email_addresses"))
});
