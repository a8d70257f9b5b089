use std::sync::LazyLock;

use crate::config::{env_flag, env_number};

/// Require a recent authentication before connecting or disconnecting accounts
pub(crate) static ACCOUNT_REAUTHENTICATION_REQUIRED: LazyLock<bool> =
    LazyLock::new(|| env_flag("ACCOUNT_REAUTHENTICATION_REQUIRED", false));

/// Seconds an authentication counts as recent
pub(crate) static ACCOUNT_REAUTHENTICATION_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| env_number("ACCOUNT_REAUTHENTICATION_TIMEOUT", 300));
