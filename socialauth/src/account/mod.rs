mod config;
mod errors;
mod mailer;
mod main;
mod password;
mod storage;
mod tokens;
mod types;

pub use errors::AccountError;
pub use mailer::{Mailer, TracingMailer, set_mailer};
pub use types::{EmailAddress, EmailVerificationMode, LoginMethod, SignupRequest};

pub(crate) use mailer::{send_mail, send_notification_mail};
pub(crate) use config::{
    ACCOUNT_EMAIL_VERIFICATION, ACCOUNT_LOGIN_BY_CODE_ENABLED, ACCOUNT_LOGIN_METHODS,
    ACCOUNT_SIGNUP_OPEN,
};
pub(crate) use main::*;
pub(crate) use password::{hash_password, verify_password};
pub(crate) use storage::EmailAddressStore;
pub(crate) use types::{EmailAssessment, normalize_email};

#[cfg(test)]
pub(crate) use mailer::test_mailer;

pub(crate) async fn init() -> Result<(), AccountError> {
    EmailAddressStore::init().await
}
