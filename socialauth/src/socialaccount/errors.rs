use thiserror::Error;

use crate::account::AccountError;
use crate::session::SessionError;
use crate::storage::{CacheErrorConversion, StorageError};
use crate::userdb::UserError;

#[derive(Debug, Error, Clone)]
pub enum SocialError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Social account not found")]
    AccountNotFound,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("No pending social signup")]
    NoPendingSignup,

    #[error("Your account has no password set up")]
    NoPassword,

    #[error("Your account has no verified email address")]
    NoVerifiedEmail,

    #[error("You cannot disconnect your last account")]
    DisconnectLast,

    #[error("Invalid social account data: {0}")]
    InvalidData(String),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl SocialError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AccountNotFound => "account_not_found",
            Self::NotAuthenticated => "not_authenticated",
            Self::NoPendingSignup => "no_pending_signup",
            Self::NoPassword => "no_password",
            Self::NoVerifiedEmail => "no_verified_email",
            Self::DisconnectLast => "disconnect_last",
            Self::Account(e) => e.code(),
            _ => "server_error",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::AccountNotFound => Some("account"),
            Self::Account(e) => e.param(),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for SocialError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for SocialError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}

impl CacheErrorConversion<SocialError> for SocialError {
    fn convert_storage_error(error: StorageError) -> SocialError {
        SocialError::Storage(error.to_string())
    }
}
