use std::sync::LazyLock;

use crate::config::{env_flag, env_number};

/// Name of the cookie carrying the session id for browser clients.
pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_COOKIE_NAME")
        .ok()
        .unwrap_or("__Host-SessionId".to_string())
});

/// Header carrying the session id for app clients.
pub const SESSION_TOKEN_HEADER: &str = "X-Session-Token";

/// Session lifetime in seconds. Defaults to two weeks.
pub(crate) static SESSION_COOKIE_MAX_AGE: LazyLock<u64> =
    LazyLock::new(|| env_number("SESSION_COOKIE_MAX_AGE", 1_209_600));

pub(super) const SESSION_CACHE_PREFIX: &str = "session";

/// Refresh `last_seen_at`, IP and user agent of a user session on every
/// request rather than only when it is first seen.
pub(crate) static USERSESSIONS_TRACK_ACTIVITY: LazyLock<bool> =
    LazyLock::new(|| env_flag("USERSESSIONS_TRACK_ACTIVITY", false));
