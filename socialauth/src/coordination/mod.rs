//! Entry points for the web layer
//!
//! Each function takes the caller's session, drives the account, social,
//! reauthentication and MFA modules, and reports expected outcomes as values.
//! The caller persists the session cookie afterwards since a login rotates the
//! session id.

mod account;
mod auth_helpers;
mod config;
mod errors;
mod mfa;
mod reauth;
mod social;
mod types;
mod user_sessions;

pub use account::{
    add_email_core, change_password_core, confirm_login_code_core, list_emails_core, login_core,
    logout_core, password_reset_user_core, remove_email_core, request_login_code_core,
    request_password_reset_core, resend_email_verification_core, reset_password_core,
    set_primary_email_core, signup_core, verify_email_core,
};
pub use auth_helpers::pending_flows;
pub use config::auth_config_core;
pub use errors::CoordinationError;
pub use mfa::{
    list_authenticators_core, mfa_authenticate_core, recovery_codes_core,
    regenerate_recovery_codes_core, totp_activate_core, totp_deactivate_core, totp_setup_core,
};
pub use reauth::{reauthenticate_core, reauthenticate_mfa_core};
pub use social::{
    disconnect_social_account_core, list_social_accounts_core, pending_signup_core,
    provider_callback_core, provider_redirect_core, social_signup_core,
};
pub use user_sessions::{end_user_sessions_core, list_user_sessions_core};
pub use types::{
    AccountConfig, AuthConfig, EmailVerificationResult, LoginOutcome, MfaConfig, PendingFlow,
    ProviderCallbackOutcome, ProviderCallbackResult, ProviderRedirectRequest, RecoveryCodes,
    ReauthenticationResult, SocialAccountConfig, TotpActivation, TotpSetup,
};
