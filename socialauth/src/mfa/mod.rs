mod config;
mod errors;
mod recovery_codes;
mod stage;
mod storage;
mod totp;
mod types;

pub use errors::MfaError;
pub use types::{Authenticator, AuthenticatorType};

pub(crate) use config::{MFA_RECOVERY_CODE_COUNT, MFA_TOTP_ISSUER};
pub(crate) use recovery_codes::{regenerate_recovery_codes, unused_codes};
pub(crate) use stage::{clear_pending_login, is_mfa_enabled, pending_login, stage_login, verify_code};
pub(crate) use storage::AuthenticatorStore;
pub(crate) use totp::{activate_totp, build_totp_url, deactivate_totp, get_totp_secret};

pub(crate) async fn init() -> Result<(), MfaError> {
    AuthenticatorStore::init().await
}

#[cfg(test)]
pub(crate) use stage::PENDING_LOGIN_SESSION_KEY;
#[cfg(test)]
pub(crate) use totp::{format_hotp_value, hotp_counter_from_time, hotp_value};
