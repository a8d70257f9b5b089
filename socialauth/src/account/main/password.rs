use serde_json::json;

use crate::account::errors::AccountError;
use crate::account::mailer::{send_mail, send_notification_mail};
use crate::account::password::{hash_password, validate_password, verify_password};
use crate::account::storage::EmailAddressStore;
use crate::account::tokens::{
    check_password_reset_token, make_password_reset_token, password_reset_token_user_id,
};
use crate::config::{ORIGIN, SA_ROUTE_PREFIX};
use crate::userdb::{User, UserStore};

/// Mail a reset link to every active user owning `email`.
///
/// Unknown addresses succeed silently so the response reveals nothing.
pub(crate) async fn request_password_reset(email: &str) -> Result<(), AccountError> {
    let addresses = EmailAddressStore::find_by_email(email).await?;
    if addresses.is_empty() {
        tracing::info!("Password reset requested for unknown address");
        return Ok(());
    }

    let mut notified = Vec::new();
    for address in addresses {
        if notified.contains(&address.user_id) {
            continue;
        }
        let Some(user) = UserStore::get_user(&address.user_id).await? else {
            continue;
        };
        if !user.is_active {
            continue;
        }

        let token = make_password_reset_token(&user)?;
        let password_reset_url = format!(
            "{}{}/password/reset/key/{}/",
            ORIGIN.as_str(),
            SA_ROUTE_PREFIX.as_str(),
            token
        );
        send_mail(
            "account/email/password_reset_key",
            &address.email,
            json!({
                "user_display": user.display_name(),
                "username": user.username,
                "key": token,
                "password_reset_url": password_reset_url,
            }),
        )
        .await?;

        tracing::info!(user_id = %user.id, "Password reset mail sent");
        notified.push(address.user_id);
    }

    Ok(())
}

/// User the reset `token` belongs to, if it is still valid.
pub(crate) async fn password_reset_user(token: &str) -> Result<User, AccountError> {
    let user_id = password_reset_token_user_id(token)?;
    let user = UserStore::get_user(&user_id)
        .await?
        .ok_or_else(|| AccountError::InvalidToken("unknown user".to_string()))?;
    check_password_reset_token(&user, token)?;
    Ok(user)
}

/// Set a new password using a reset token. The token dies with the old hash.
pub(crate) async fn reset_password(token: &str, new_password: &str) -> Result<User, AccountError> {
    let mut user = password_reset_user(token).await?;
    validate_password(new_password)?;

    user.password_hash = Some(hash_password(new_password)?);
    let user = UserStore::upsert_user(user).await?;

    notify_password_changed(&user).await?;
    tracing::info!(user_id = %user.id, "Password reset");
    Ok(user)
}

/// Change or, when the user has none yet, set the password.
pub(crate) async fn change_password(
    user_id: &str,
    current_password: Option<&str>,
    new_password: &str,
) -> Result<User, AccountError> {
    let mut user = UserStore::get_user(user_id)
        .await?
        .ok_or(AccountError::InvalidCredentials)?;

    if user.has_usable_password() {
        let hash = user.password_hash.as_deref().unwrap_or_default();
        match current_password {
            Some(current) if verify_password(current, hash) => {}
            Some(_) => return Err(AccountError::IncorrectPassword),
            None => {
                return Err(AccountError::validation(
                    "current_password",
                    "This field is required.",
                ));
            }
        }
    }

    validate_password(new_password)?;
    user.password_hash = Some(hash_password(new_password)?);
    let user = UserStore::upsert_user(user).await?;

    notify_password_changed(&user).await?;
    tracing::info!(user_id = %user.id, "Password changed");
    Ok(user)
}

async fn notify_password_changed(user: &User) -> Result<(), AccountError> {
    send_notification_mail("account/email/password_changed", user).await
}
