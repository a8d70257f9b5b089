use thiserror::Error;

use crate::storage::{CacheErrorConversion, StorageError};

#[derive(Debug, Error, Clone)]
pub enum JwtError {
    #[error("Invalid token format: {0}")]
    InvalidFormat(String),

    #[error("Missing key component: {0}")]
    MissingKeyComponent(String),

    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),

    #[error("No matching key found in JWKS")]
    NoMatchingKey,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token replayed")]
    Replayed,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl JwtError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Replayed => "token_replayed",
            Self::Storage(_) | Self::JwksFetch(_) => "server_error",
            _ => "invalid_token",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidToken(err.to_string())
    }
}

impl CacheErrorConversion<JwtError> for JwtError {
    fn convert_storage_error(error: StorageError) -> JwtError {
        JwtError::Storage(error.to_string())
    }
}
