//! Error type returned by every public coordination function

use thiserror::Error;

use crate::account::AccountError;
use crate::mfa::MfaError;
use crate::providers::ProviderError;
use crate::reauth::ReauthError;
use crate::session::SessionError;
use crate::socialaccount::SocialError;
use crate::userdb::UserError;
use crate::utils::UtilError;

#[derive(Error, Debug)]
pub enum CoordinationError {
    /// No user is bound to the session
    #[error("Unauthorized access")]
    Unauthorized,

    /// The action needs an anonymous session
    #[error("You are already authenticated")]
    UnexpectedlyAuthorized,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Resource not found: {resource_type} {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("Account error: {0}")]
    Account(AccountError),

    #[error("Social account error: {0}")]
    Social(SocialError),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Reauthentication error: {0}")]
    Reauth(ReauthError),

    #[error("MFA error: {0}")]
    Mfa(MfaError),

    #[error("Session error: {0}")]
    Session(SessionError),

    #[error("User error: {0}")]
    User(UserError),

    #[error("Utils error: {0}")]
    Utils(UtilError),
}

impl CoordinationError {
    /// Log the error and return self
    pub fn log(self) -> Self {
        match &self {
            Self::Unauthorized => tracing::error!("Unauthorized access"),
            Self::UnexpectedlyAuthorized => tracing::error!("Unexpectedly authorized access"),
            Self::InvalidState(msg) => tracing::error!("Invalid state: {}", msg),
            Self::ResourceNotFound {
                resource_type,
                resource_id,
            } => tracing::error!("Resource not found: {} {}", resource_type, resource_id),
            Self::Account(err) => tracing::error!("Account error: {}", err),
            Self::Social(err) => tracing::error!("Social account error: {}", err),
            Self::Provider(err) => tracing::error!("Provider error: {}", err),
            Self::Reauth(err) => tracing::error!("Reauthentication error: {}", err),
            Self::Mfa(err) => tracing::error!("MFA error: {}", err),
            Self::Session(err) => tracing::error!("Session error: {}", err),
            Self::User(err) => tracing::error!("User error: {}", err),
            Self::Utils(err) => tracing::error!("Utils error: {}", err),
        }
        self
    }

    /// Machine readable code for the JSON API
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "not_authenticated",
            Self::UnexpectedlyAuthorized => "already_authenticated",
            Self::InvalidState(_) => "invalid",
            Self::ResourceNotFound { .. } => "not_found",
            Self::Account(e) => e.code(),
            Self::Social(e) => e.code(),
            Self::Provider(e) => e.code(),
            Self::Reauth(e) => e.code(),
            Self::Mfa(e) => e.code(),
            Self::Session(_) | Self::User(_) | Self::Utils(_) => "server_error",
        }
    }

    /// Request parameter the error refers to, if any
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Account(e) => e.param(),
            Self::Social(e) => e.param(),
            Self::Provider(e) => e.param(),
            Self::Reauth(e) => e.param(),
            Self::Mfa(e) => e.param(),
            _ => None,
        }
    }

    /// Whether the caller must reauthenticate before retrying
    pub fn is_reauthentication_required(&self) -> bool {
        matches!(self, Self::Reauth(ReauthError::Required))
    }
}

// Conversions log at the point the error crosses into the public API.
// Expected user errors are logged at debug level only.

impl From<AccountError> for CoordinationError {
    fn from(err: AccountError) -> Self {
        match err.code() {
            "server_error" => tracing::error!("Account error: {}", err),
            _ => tracing::debug!("Account error: {}", err),
        }
        Self::Account(err)
    }
}

impl From<SocialError> for CoordinationError {
    fn from(err: SocialError) -> Self {
        match err.code() {
            "server_error" => tracing::error!("Social account error: {}", err),
            _ => tracing::debug!("Social account error: {}", err),
        }
        Self::Social(err)
    }
}

impl From<ProviderError> for CoordinationError {
    fn from(err: ProviderError) -> Self {
        match err.code() {
            "server_error" | "provider_error" => tracing::error!("Provider error: {}", err),
            _ => tracing::debug!("Provider error: {}", err),
        }
        Self::Provider(err)
    }
}

impl From<ReauthError> for CoordinationError {
    fn from(err: ReauthError) -> Self {
        match err.code() {
            "server_error" => tracing::error!("Reauthentication error: {}", err),
            _ => tracing::debug!("Reauthentication error: {}", err),
        }
        Self::Reauth(err)
    }
}

impl From<MfaError> for CoordinationError {
    fn from(err: MfaError) -> Self {
        match err.code() {
            "server_error" => tracing::error!("MFA error: {}", err),
            _ => tracing::debug!("MFA error: {}", err),
        }
        Self::Mfa(err)
    }
}

impl From<SessionError> for CoordinationError {
    fn from(err: SessionError) -> Self {
        let error = Self::Session(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UserError> for CoordinationError {
    fn from(err: UserError) -> Self {
        let error = Self::User(err);
        tracing::error!("{}", error);
        error
    }
}

impl From<UtilError> for CoordinationError {
    fn from(err: UtilError) -> Self {
        let error = Self::Utils(err);
        tracing::error!("{}", error);
        error
    }
}
