use std::sync::LazyLock;

use crate::account::types::{EmailVerificationMode, LoginMethod};
use crate::config::{env_flag, env_number};

pub(crate) static ACCOUNT_SIGNUP_OPEN: LazyLock<bool> =
    LazyLock::new(|| env_flag("ACCOUNT_SIGNUP_OPEN", true));

pub(crate) static ACCOUNT_EMAIL_VERIFICATION: LazyLock<EmailVerificationMode> =
    LazyLock::new(|| {
        std::env::var("ACCOUNT_EMAIL_VERIFICATION")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(EmailVerificationMode::Optional)
    });

pub(crate) static ACCOUNT_EMAIL_VERIFICATION_EXPIRE_DAYS: LazyLock<i64> =
    LazyLock::new(|| env_number("ACCOUNT_EMAIL_VERIFICATION_EXPIRE_DAYS", 3));

/// Seconds a password reset token stays valid
pub(crate) static ACCOUNT_PASSWORD_RESET_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| env_number("ACCOUNT_PASSWORD_RESET_TIMEOUT", 259_200));

pub(crate) static ACCOUNT_PASSWORD_MIN_LENGTH: LazyLock<usize> =
    LazyLock::new(|| env_number("ACCOUNT_PASSWORD_MIN_LENGTH", 8));

pub(crate) static ACCOUNT_LOGIN_METHODS: LazyLock<Vec<LoginMethod>> = LazyLock::new(|| {
    let raw = std::env::var("ACCOUNT_LOGIN_METHODS").unwrap_or_else(|_| "email,username".into());
    let methods = LoginMethod::parse_list(&raw);
    if methods.is_empty() {
        tracing::warn!("ACCOUNT_LOGIN_METHODS has no valid entries, using email and username");
        vec![LoginMethod::Email, LoginMethod::Username]
    } else {
        methods
    }
});

pub(crate) static ACCOUNT_PREVENT_ENUMERATION: LazyLock<bool> =
    LazyLock::new(|| env_flag("ACCOUNT_PREVENT_ENUMERATION", true));

pub(crate) static ACCOUNT_LOGIN_BY_CODE_ENABLED: LazyLock<bool> =
    LazyLock::new(|| env_flag("ACCOUNT_LOGIN_BY_CODE_ENABLED", false));

/// Seconds an emailed login code stays valid
pub(crate) static ACCOUNT_LOGIN_BY_CODE_TIMEOUT: LazyLock<i64> =
    LazyLock::new(|| env_number("ACCOUNT_LOGIN_BY_CODE_TIMEOUT", 180));

pub(crate) static ACCOUNT_LOGIN_BY_CODE_MAX_ATTEMPTS: LazyLock<u32> =
    LazyLock::new(|| env_number("ACCOUNT_LOGIN_BY_CODE_MAX_ATTEMPTS", 3));
