use serde_json::json;

use crate::account::errors::AccountError;
use crate::account::mailer::send_mail;
use crate::account::storage::EmailAddressStore;
use crate::account::tokens::{make_email_verification_key, parse_email_verification_key};
use crate::account::types::EmailAddress;
use crate::config::{ORIGIN, SA_ROUTE_PREFIX};
use crate::userdb::{User, UserStore};

pub(crate) async fn send_email_verification(user: &User, email: &str) -> Result<(), AccountError> {
    let key = make_email_verification_key(&user.id, email)?;
    let activate_url = format!(
        "{}{}/confirm-email/{}/",
        ORIGIN.as_str(),
        SA_ROUTE_PREFIX.as_str(),
        key
    );

    send_mail(
        "account/email/email_confirmation",
        email,
        json!({
            "user_display": user.display_name(),
            "key": key,
            "activate_url": activate_url,
        }),
    )
    .await?;

    tracing::info!(user_id = %user.id, "Email verification sent");
    Ok(())
}

/// Mark the address named by `key` as verified.
///
/// Refused when another user already holds the same address verified. The
/// address becomes primary when the user has no verified primary yet.
pub(crate) async fn confirm_email_verification(key: &str) -> Result<EmailAddress, AccountError> {
    let (user_id, email) = parse_email_verification_key(key)?;

    let address = EmailAddressStore::get_email(&user_id, &email)
        .await?
        .ok_or_else(|| AccountError::InvalidToken("unknown email address".to_string()))?;

    let verified_elsewhere = EmailAddressStore::find_by_email(&email)
        .await?
        .iter()
        .any(|a| a.verified && a.user_id != user_id);
    if verified_elsewhere {
        tracing::warn!(user_id = %user_id, "Email already verified by another user");
        return Err(AccountError::EmailTaken);
    }

    if !address.verified {
        EmailAddressStore::mark_verified(&user_id, &email).await?;
    }

    let needs_primary = match EmailAddressStore::get_primary(&user_id).await? {
        Some(primary) => !primary.verified && primary.email != address.email,
        None => true,
    };
    if needs_primary {
        EmailAddressStore::set_primary(&user_id, &email).await?;
        if let Some(mut user) = UserStore::get_user(&user_id).await? {
            user.email = Some(address.email.clone());
            UserStore::upsert_user(user).await?;
        }
    }

    tracing::info!(user_id = %user_id, "Email address verified");
    EmailAddressStore::get_email(&user_id, &email)
        .await?
        .ok_or(AccountError::EmailNotFound)
}
