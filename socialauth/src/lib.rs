//! socialauth - account management, social login and MFA for Rust web applications
//!
//! This crate holds the framework independent core. Web integrations call the
//! `*_core` coordination functions with the caller's [`Session`] and render
//! the returned outcomes.

mod account;
mod config;
mod coordination;
mod jwt;
mod mfa;
mod providers;
mod reauth;
mod session;
mod socialaccount;
mod storage;
mod userdb;
mod utils;

#[cfg(test)]
mod test_utils;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use coordination::{
    AccountConfig, AuthConfig, CoordinationError, EmailVerificationResult, LoginOutcome,
    MfaConfig, PendingFlow, ProviderCallbackOutcome, ProviderCallbackResult,
    ProviderRedirectRequest, ReauthenticationResult, RecoveryCodes, SocialAccountConfig,
    TotpActivation, TotpSetup, add_email_core, auth_config_core, change_password_core,
    confirm_login_code_core, disconnect_social_account_core, end_user_sessions_core,
    list_authenticators_core, list_emails_core, list_social_accounts_core,
    list_user_sessions_core, login_core, logout_core, mfa_authenticate_core,
    password_reset_user_core, pending_flows, pending_signup_core, provider_callback_core,
    provider_redirect_core, reauthenticate_core, reauthenticate_mfa_core, recovery_codes_core,
    regenerate_recovery_codes_core, remove_email_core, request_login_code_core,
    request_password_reset_core, resend_email_verification_core, reset_password_core,
    set_primary_email_core, signup_core, social_signup_core, totp_activate_core,
    totp_deactivate_core, totp_setup_core, verify_email_core,
};

// Re-export the route prefix and origin
pub use config::{ORIGIN, SA_ROUTE_PREFIX};

pub use account::{
    AccountError, EmailAddress, EmailVerificationMode, LoginMethod, Mailer, SignupRequest,
    TracingMailer, set_mailer,
};
pub use jwt::{Claims, JwtError, verify_and_decode, verify_jti};
pub use mfa::{Authenticator, AuthenticatorType, MfaError};
pub use providers::{
    CallbackParams, CommonFields, Provider, ProviderError, ProviderInfo, TokenResponse,
    get_provider, list_providers,
};
pub use reauth::{
    ReauthError, ResumeAction, ResumeState, StashedRequest, did_recently_authenticate,
    has_pending_reauthentication, suspend_request, take_released_request,
};
pub use session::{
    AuthenticationMethod, AuthenticationRecord, ClientInfo, SESSION_COOKIE_NAME,
    SESSION_TOKEN_HEADER, Session, SessionError, SessionUser, UserSession, delete_session,
    get_session_id_from_headers, get_user_from_session, load_or_create_session, load_session,
    prepare_logout_response, save_session, session_cookie_header, touch_user_session,
};
pub use socialaccount::{
    AuthProcess, LoginState, ProviderEmail, SocialAccount, SocialApp, SocialError, SocialLogin,
    SocialLoginOutcome, SocialToken,
};
pub use storage::CacheData;
pub use userdb::{User, UserError};
pub use utils::UtilError;

/// Initialize the stores behind every module
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    storage::init().await?;
    userdb::init().await?;
    session::init().await?;
    account::init().await?;
    socialaccount::init().await?;
    mfa::init().await?;
    Ok(())
}
