use thiserror::Error;

use crate::account::AccountError;
use crate::mfa::MfaError;
use crate::session::SessionError;
use crate::userdb::UserError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum ReauthError {
    #[error("Reauthentication required")]
    Required,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("MFA error: {0}")]
    Mfa(#[from] MfaError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl ReauthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Required => "reauthentication_required",
            Self::NotAuthenticated => "not_authenticated",
            Self::IncorrectPassword => "incorrect_password",
            Self::Mfa(e) => e.code(),
            Self::Account(e) => e.code(),
            _ => "server_error",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::IncorrectPassword => Some("password"),
            Self::Mfa(e) => e.param(),
            Self::Account(e) => e.param(),
            _ => None,
        }
    }
}
