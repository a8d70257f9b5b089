use thiserror::Error;

use crate::session::SessionError;
use crate::userdb::UserError;
use crate::utils::UtilError;

#[derive(Debug, Error, Clone)]
pub enum AccountError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{message}")]
    Validation { param: String, message: String },

    #[error("Signup is currently closed")]
    SignupClosed,

    #[error("A user is already registered with this email address")]
    EmailTaken,

    #[error("A user with that username already exists")]
    UsernameTaken,

    #[error("The credentials you specified are not correct")]
    InvalidCredentials,

    #[error("Incorrect password")]
    IncorrectPassword,

    #[error("This account is inactive")]
    Inactive,

    #[error("Invalid or expired key: {0}")]
    InvalidToken(String),

    #[error("Email address not found")]
    EmailNotFound,

    #[error("You cannot remove your primary email address")]
    CannotRemovePrimary,

    #[error("You must keep at least one verified email address")]
    LastVerifiedEmail,

    #[error("Your primary email address must be verified")]
    UnverifiedPrimary,

    #[error("Email address has not been verified")]
    UnverifiedEmail,

    #[error("Login by code is not enabled")]
    LoginByCodeDisabled,

    #[error("No login code was requested")]
    NoPendingLoginCode,

    #[error("Incorrect code")]
    IncorrectCode,

    #[error("Too many failed attempts, request a new code")]
    TooManyCodeAttempts,

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("User error: {0}")]
    User(#[from] UserError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}

impl AccountError {
    pub(crate) fn validation(param: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            param: param.to_string(),
            message: message.into(),
        }
    }

    /// Machine readable code used by the JSON API.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "invalid",
            Self::SignupClosed => "signup_closed",
            Self::EmailTaken => "email_taken",
            Self::UsernameTaken => "username_taken",
            Self::InvalidCredentials => "email_password_mismatch",
            Self::IncorrectPassword => "incorrect_password",
            Self::Inactive => "account_inactive",
            Self::InvalidToken(_) => "invalid_or_expired_key",
            Self::EmailNotFound => "email_not_found",
            Self::CannotRemovePrimary => "cannot_remove_primary_email",
            Self::LastVerifiedEmail => "cannot_remove_last_verified_email",
            Self::UnverifiedPrimary => "unverified_primary_email",
            Self::UnverifiedEmail => "unverified_email",
            Self::LoginByCodeDisabled => "login_by_code_disabled",
            Self::NoPendingLoginCode => "no_pending_login_code",
            Self::IncorrectCode => "incorrect_code",
            Self::TooManyCodeAttempts => "too_many_login_attempts",
            _ => "server_error",
        }
    }

    /// Request parameter the error refers to, if any.
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::Validation { param, .. } => Some(param),
            Self::EmailTaken | Self::EmailNotFound | Self::UnverifiedPrimary => Some("email"),
            Self::UsernameTaken => Some("username"),
            Self::IncorrectPassword => Some("current_password"),
            Self::InvalidCredentials => Some("password"),
            Self::InvalidToken(_) => Some("key"),
            Self::IncorrectCode => Some("code"),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_params() {
        let error = AccountError::validation("password", "too short");
        assert_eq!(error.to_string(), "too short");
        assert_eq!(error.code(), "invalid");
        assert_eq!(error.param(), Some("password"));

        assert_eq!(AccountError::EmailTaken.code(), "email_taken");
        assert_eq!(AccountError::EmailTaken.param(), Some("email"));
        assert_eq!(AccountError::Storage("x".into()).code(), "server_error");
        assert_eq!(AccountError::SignupClosed.param(), None);
    }

    #[test]
    fn test_from_user_error() {
        let error: AccountError = UserError::NotFound.into();
        assert!(matches!(error, AccountError::User(UserError::NotFound)));
    }
}
