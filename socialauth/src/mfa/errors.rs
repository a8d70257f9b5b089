use thiserror::Error;

use crate::session::SessionError;
use crate::storage::{CacheErrorConversion, StorageError};
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum MfaError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Incorrect code")]
    IncorrectCode,

    #[error("Authenticator not found")]
    NotFound,

    #[error("Authenticator is already active")]
    AlreadyActive,

    #[error("No pending TOTP secret in session")]
    NoPendingSecret,

    #[error("No login is waiting for a second factor")]
    NoPendingLogin,

    #[error("Invalid authenticator data: {0}")]
    InvalidData(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl MfaError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IncorrectCode => "incorrect_code",
            Self::NotFound => "authenticator_not_found",
            Self::AlreadyActive => "authenticator_already_active",
            Self::NoPendingSecret | Self::NoPendingLogin => "invalid",
            _ => "server_error",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::IncorrectCode => Some("code"),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MfaError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MfaError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(err.to_string())
    }
}

impl CacheErrorConversion<MfaError> for MfaError {
    fn convert_storage_error(error: StorageError) -> MfaError {
        MfaError::Storage(error.to_string())
    }
}
