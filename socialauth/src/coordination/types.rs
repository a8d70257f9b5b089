use serde::{Deserialize, Serialize};

use crate::account::{EmailAddress, LoginMethod};
use crate::mfa::Authenticator;
use crate::providers::ProviderInfo;
use crate::reauth::StashedRequest;
use crate::session::SessionUser;
use crate::socialaccount::{AuthProcess, SocialAccount};

/// Result of a credential check that may need more steps before the
/// session is bound to the user.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    LoggedIn(SessionUser),
    /// The session holds a pending login until a second factor is provided
    MfaRequired,
    /// Mandatory verification blocks the login; a mail went to `email`
    VerificationRequired { email: String },
}

/// Parameters of a provider redirect request.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProviderRedirectRequest {
    pub provider: String,
    #[serde(default)]
    pub process: AuthProcess,
    /// Where to go once the provider dance finishes
    #[serde(default, alias = "callback_url")]
    pub next: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub auth_params: Option<String>,
}

/// What a provider callback amounted to.
#[derive(Debug, Clone)]
pub enum ProviderCallbackOutcome {
    Login(LoginOutcome),
    Connected(SocialAccount),
    AlreadyConnected(SocialAccount),
    /// Signup needs more input; see [`pending_signup_core`](crate::pending_signup_core)
    SignupRequired,
    ConnectedToOther,
    SignupClosed,
    DuplicateEmail { email: String },
    Redirect { url: String },
    ReauthenticationRequired { url: String },
}

#[derive(Debug, Clone)]
pub struct ProviderCallbackResult {
    pub outcome: ProviderCallbackOutcome,
    pub next: Option<String>,
}

/// How to continue after a successful reauthentication.
#[derive(Debug, Clone)]
pub enum ReauthenticationResult {
    /// Reissue this request
    Replay(StashedRequest),
    /// A provider connect that waited for reauthentication has finished
    Connected(ProviderCallbackResult),
    Redirect(String),
    Done,
}

#[derive(Debug, Clone)]
pub struct EmailVerificationResult {
    pub email: EmailAddress,
    /// Set when the verification also completed a blocked login
    pub login: Option<LoginOutcome>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotpSetup {
    pub secret: String,
    pub totp_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TotpActivation {
    pub authenticator: Authenticator,
    pub recovery_codes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryCodes {
    pub total_code_count: usize,
    pub unused_code_count: usize,
    pub unused_codes: Vec<String>,
    pub authenticator: Authenticator,
}

/// Flows waiting in a session, reported to clients on 401 responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingFlow {
    Reauthenticate,
    MfaAuthenticate,
    ProviderSignup,
    VerifyEmail,
    LoginByCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountConfig {
    pub login_methods: Vec<LoginMethod>,
    pub is_open: bool,
    pub email_verification: crate::account::EmailVerificationMode,
    pub reauthentication_required: bool,
    pub login_by_code_enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialAccountConfig {
    pub providers: Vec<ProviderInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MfaConfig {
    pub supported_types: Vec<&'static str>,
}

/// Public configuration served to clients.
#[derive(Debug, Clone, Serialize)]
pub struct AuthConfig {
    pub account: AccountConfig,
    pub socialaccount: SocialAccountConfig,
    pub mfa: MfaConfig,
}
