use crate::account::config::ACCOUNT_EMAIL_VERIFICATION;
use crate::account::errors::AccountError;
use crate::account::storage::EmailAddressStore;
use crate::account::types::{EmailAddress, EmailAssessment, EmailVerificationMode};
use crate::userdb::UserStore;

use super::email_verification::send_email_verification;
use super::signup::{assess_unique_email, validate_email};

pub(crate) async fn list_email_addresses(user_id: &str) -> Result<Vec<EmailAddress>, AccountError> {
    EmailAddressStore::get_emails(user_id).await
}

/// Attach a new, unverified address to the user and send a verification mail.
pub(crate) async fn add_email_address(
    user_id: &str,
    email: &str,
) -> Result<EmailAddress, AccountError> {
    let email = validate_email(email)?;
    let user = UserStore::get_user(user_id)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    if EmailAddressStore::get_email(user_id, &email).await?.is_some() {
        return Err(AccountError::validation(
            "email",
            "This email address is already associated with this account.",
        ));
    }

    // Under enumeration prevention a taken address is still added; it cannot
    // be verified while another user holds it verified.
    if assess_unique_email(&email).await? == EmailAssessment::Taken {
        return Err(AccountError::EmailTaken);
    }

    let is_first = EmailAddressStore::get_emails(user_id).await?.is_empty();
    let address =
        EmailAddressStore::add_email(EmailAddress::new(user_id, &email, false, is_first)).await?;

    if is_first {
        let mut user = user.clone();
        user.email = Some(address.email.clone());
        UserStore::upsert_user(user).await?;
    }

    send_email_verification(&user, &address.email).await?;
    tracing::info!(user_id = %user_id, "Email address added");
    Ok(address)
}

pub(crate) async fn remove_email_address(user_id: &str, email: &str) -> Result<(), AccountError> {
    let address = EmailAddressStore::get_email(user_id, email)
        .await?
        .ok_or(AccountError::EmailNotFound)?;

    if address.primary {
        return Err(AccountError::CannotRemovePrimary);
    }

    if address.verified && *ACCOUNT_EMAIL_VERIFICATION == EmailVerificationMode::Mandatory {
        let verified = EmailAddressStore::get_emails(user_id)
            .await?
            .iter()
            .filter(|a| a.verified)
            .count();
        if verified <= 1 {
            return Err(AccountError::LastVerifiedEmail);
        }
    }

    EmailAddressStore::delete_email(user_id, &address.email).await?;
    tracing::info!(user_id = %user_id, "Email address removed");
    Ok(())
}

/// Make `email` the user's primary address and mirror it onto the user.
pub(crate) async fn set_primary_email(
    user_id: &str,
    email: &str,
) -> Result<EmailAddress, AccountError> {
    let address = EmailAddressStore::get_email(user_id, email)
        .await?
        .ok_or(AccountError::EmailNotFound)?;

    if !address.verified && *ACCOUNT_EMAIL_VERIFICATION != EmailVerificationMode::None {
        let has_verified = EmailAddressStore::has_verified_email(user_id).await?;
        if has_verified {
            return Err(AccountError::UnverifiedPrimary);
        }
    }

    EmailAddressStore::set_primary(user_id, &address.email).await?;

    if let Some(mut user) = UserStore::get_user(user_id).await? {
        user.email = Some(address.email.clone());
        UserStore::upsert_user(user).await?;
    }

    tracing::info!(user_id = %user_id, "Primary email address changed");
    EmailAddressStore::get_email(user_id, &address.email)
        .await?
        .ok_or(AccountError::EmailNotFound)
}
