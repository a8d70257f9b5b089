use std::sync::LazyLock;

use crate::config::env_number;

/// Seconds per TOTP step
pub(crate) static MFA_TOTP_PERIOD: LazyLock<u64> =
    LazyLock::new(|| env_number("MFA_TOTP_PERIOD", 30));

pub(crate) static MFA_TOTP_DIGITS: LazyLock<u32> =
    LazyLock::new(|| env_number("MFA_TOTP_DIGITS", 6));

/// Issuer shown by authenticator apps
pub(crate) static MFA_TOTP_ISSUER: LazyLock<String> = LazyLock::new(|| {
    std::env::var("MFA_TOTP_ISSUER").unwrap_or_else(|_| "socialauth".to_string())
});

pub(crate) static MFA_RECOVERY_CODE_COUNT: LazyLock<usize> =
    LazyLock::new(|| env_number("MFA_RECOVERY_CODE_COUNT", 10));

pub(crate) static MFA_RECOVERY_CODE_DIGITS: LazyLock<u32> =
    LazyLock::new(|| env_number("MFA_RECOVERY_CODE_DIGITS", 8));

/// Seconds a password-authenticated login may wait for its second factor
pub(crate) static MFA_LOGIN_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| env_number("MFA_LOGIN_TIMEOUT", 900));
