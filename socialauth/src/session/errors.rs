use thiserror::Error;

use crate::storage::{CacheErrorConversion, StorageError};
use crate::userdb::UserError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("Session error")]
    SessionError,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("CSRF token error: {0}")]
    CsrfToken(String),

    #[error("Header error: {0}")]
    HeaderError(String),

    /// Error from utils operations
    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),

    /// Error from user database operations
    #[error("User error: {0}")]
    User(#[from] UserError),
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl CacheErrorConversion<SessionError> for SessionError {
    fn convert_storage_error(error: StorageError) -> SessionError {
        SessionError::Storage(error.to_string())
    }
}
