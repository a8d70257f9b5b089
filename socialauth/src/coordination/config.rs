use super::types::{AccountConfig, AuthConfig, MfaConfig, SocialAccountConfig};
use crate::account::{
    ACCOUNT_EMAIL_VERIFICATION, ACCOUNT_LOGIN_BY_CODE_ENABLED, ACCOUNT_LOGIN_METHODS,
    ACCOUNT_SIGNUP_OPEN,
};
use crate::providers::list_providers;
use crate::reauth::ACCOUNT_REAUTHENTICATION_REQUIRED;

/// Configuration a client needs to render its login screens.
pub fn auth_config_core() -> AuthConfig {
    AuthConfig {
        account: AccountConfig {
            login_methods: ACCOUNT_LOGIN_METHODS.clone(),
            is_open: *ACCOUNT_SIGNUP_OPEN,
            email_verification: *ACCOUNT_EMAIL_VERIFICATION,
            reauthentication_required: *ACCOUNT_REAUTHENTICATION_REQUIRED,
            login_by_code_enabled: *ACCOUNT_LOGIN_BY_CODE_ENABLED,
        },
        socialaccount: SocialAccountConfig {
            providers: list_providers(),
        },
        mfa: MfaConfig {
            supported_types: vec!["totp", "recovery_codes"],
        },
    }
}
