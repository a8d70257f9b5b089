use std::{env, sync::LazyLock};

use crate::storage::DB_TABLE_PREFIX;

/// User sessions table name
pub(super) static DB_TABLE_USER_SESSIONS: LazyLock<String> = LazyLock::new(|| {
    env::var("DB_TABLE_USER_SESSIONS")
        .unwrap_or_else(|_| format!("{}{}", *DB_TABLE_PREFIX, "user_sessions"))
});
