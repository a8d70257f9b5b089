use thiserror::Error;

use crate::jwt::JwtError;
use crate::session::SessionError;
use crate::storage::{CacheErrorConversion, StorageError};
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum ProviderError {
    /// The user backed out at the provider
    #[error("Login cancelled")]
    Cancelled,

    #[error("Login denied by provider: {0}")]
    Denied(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid or expired state")]
    InvalidState,

    #[error("Nonce mismatch")]
    NonceMismatch,

    #[error("Token exchange error: {0}")]
    TokenExchange(String),

    #[error("Fetch user info error: {0}")]
    FetchUserInfo(String),

    #[error("Invalid profile data: {0}")]
    InvalidProfile(String),

    #[error("OIDC discovery error: {0}")]
    Discovery(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serde error: {0}")]
    Serde(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] JwtError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl ProviderError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => "provider_cancelled",
            Self::Denied(_) => "provider_denied",
            Self::UnknownProvider(_) | Self::NotConfigured(_) => "unknown_provider",
            Self::InvalidState | Self::NonceMismatch => "invalid_state",
            Self::Jwt(e) => e.code(),
            Self::Storage(_) | Self::Serde(_) | Self::Session(_) | Self::Utils(_) => "server_error",
            _ => "provider_error",
        }
    }

    pub fn param(&self) -> Option<&str> {
        match self {
            Self::UnknownProvider(_) | Self::NotConfigured(_) => Some("provider"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

impl CacheErrorConversion<ProviderError> for ProviderError {
    fn convert_storage_error(error: StorageError) -> ProviderError {
        ProviderError::Storage(error.to_string())
    }
}
