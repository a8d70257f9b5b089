use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

pub(super) static DB_TABLE_SOCIAL_ACCOUNTS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_SOCIAL_ACCOUNTS")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "social_accounts"))
});

pub(super) static DB_TABLE_SOCIAL_TOKENS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_SOCIAL_TOKENS")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "social_tokens"))
});
