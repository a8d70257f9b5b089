use std::sync::LazyLock;

use crate::config::{env_flag, env_number};

/// Create users from social logins without asking for extra input
pub(crate) static SOCIALACCOUNT_AUTO_SIGNUP: LazyLock<bool> =
    LazyLock::new(|| env_flag("SOCIALACCOUNT_AUTO_SIGNUP", true));

pub(crate) static SOCIALACCOUNT_EMAIL_REQUIRED: LazyLock<bool> =
    LazyLock::new(|| env_flag("SOCIALACCOUNT_EMAIL_REQUIRED", false));

/// Users can only log in through providers; there are no local passwords
pub(crate) static SOCIALACCOUNT_ONLY: LazyLock<bool> =
    LazyLock::new(|| env_flag("SOCIALACCOUNT_ONLY", false));

pub(crate) static SOCIALACCOUNT_STORE_TOKENS: LazyLock<bool> =
    LazyLock::new(|| env_flag("SOCIALACCOUNT_STORE_TOKENS", true));

/// Ask providers for the user's email address when they support it
pub(crate) static SOCIALACCOUNT_QUERY_EMAIL: LazyLock<bool> =
    LazyLock::new(|| env_flag("SOCIALACCOUNT_QUERY_EMAIL", true));

/// Seconds an OAuth state parameter stays valid
pub(crate) static SOCIALACCOUNT_STATE_TTL: LazyLock<u64> =
    LazyLock::new(|| env_number("SOCIALACCOUNT_STATE_TTL", 600));
