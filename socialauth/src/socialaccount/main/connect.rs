use serde_json::json;

use crate::account::{
    ACCOUNT_EMAIL_VERIFICATION, EmailAddress, EmailAddressStore, EmailVerificationMode,
    send_mail,
};
use crate::socialaccount::config::{SOCIALACCOUNT_ONLY, SOCIALACCOUNT_STORE_TOKENS};
use crate::socialaccount::errors::SocialError;
use crate::socialaccount::storage::SocialAccountStore;
use crate::socialaccount::types::{SocialAccount, SocialLogin, SocialLoginOutcome};
use crate::userdb::UserStore;

/// Attach the remote identity to `user_id`.
///
/// An identity already bound to another user stays with that user.
pub(crate) async fn connect(
    user_id: &str,
    mut login: SocialLogin,
) -> Result<SocialLoginOutcome, SocialError> {
    if login.is_existing {
        if login.account.user_id != user_id {
            tracing::warn!(
                user_id = %user_id,
                provider = %login.account.provider,
                "Refused to connect an account owned by another user"
            );
            return Ok(SocialLoginOutcome::ConnectedToOther);
        }
        tracing::info!(user_id = %user_id, provider = %login.account.provider, "Social account refreshed");
        return Ok(SocialLoginOutcome::AlreadyConnected(login.account));
    }

    login.account.user_id = user_id.to_string();
    SocialAccountStore::insert_account(&login.account)
        .await
        .map_err(|e| {
            // Lost a race against another connect of the same identity
            tracing::warn!("Failed to insert social account: {}", e);
            e
        })?;

    if let Some(token) = login.token.as_mut() {
        token.account_id = login.account.id.clone();
        if *SOCIALACCOUNT_STORE_TOKENS {
            SocialAccountStore::upsert_token(token).await?;
        }
    }

    // Provider addresses are added as-is; none becomes primary
    for provided in &login.email_addresses {
        let known = EmailAddressStore::get_email(user_id, &provided.email).await?;
        let held_elsewhere = EmailAddressStore::find_by_email(&provided.email)
            .await?
            .iter()
            .any(|a| a.verified && a.user_id != user_id);
        if known.is_none() && !held_elsewhere {
            EmailAddressStore::add_email(EmailAddress::new(
                user_id,
                &provided.email,
                provided.verified,
                false,
            ))
            .await?;
        }
    }

    tracing::info!(user_id = %user_id, provider = %login.account.provider, "Social account connected");
    Ok(SocialLoginOutcome::Connected(login.account))
}

pub(crate) async fn list_accounts(user_id: &str) -> Result<Vec<SocialAccount>, SocialError> {
    SocialAccountStore::get_accounts_by_user(user_id).await
}

/// Refuse to remove the binding when it would lock the user out.
pub(crate) async fn validate_disconnect(account: &SocialAccount) -> Result<(), SocialError> {
    let accounts = SocialAccountStore::get_accounts_by_user(&account.user_id).await?;
    let is_last = !accounts.iter().any(|a| a.id != account.id);
    if !is_last {
        return Ok(());
    }

    if *SOCIALACCOUNT_ONLY {
        return Err(SocialError::DisconnectLast);
    }

    let user = UserStore::get_user(&account.user_id)
        .await?
        .ok_or(SocialError::AccountNotFound)?;
    if !user.has_usable_password() {
        return Err(SocialError::NoPassword);
    }

    if *ACCOUNT_EMAIL_VERIFICATION == EmailVerificationMode::Mandatory
        && !EmailAddressStore::has_verified_email(&user.id).await?
    {
        return Err(SocialError::NoVerifiedEmail);
    }

    Ok(())
}

/// Remove the user's binding identified by provider and uid.
pub(crate) async fn disconnect(
    user_id: &str,
    provider: &str,
    uid: &str,
) -> Result<SocialAccount, SocialError> {
    let account = SocialAccountStore::get_by_provider_uid(provider, uid)
        .await?
        .filter(|a| a.user_id == user_id)
        .ok_or(SocialError::AccountNotFound)?;

    validate_disconnect(&account).await?;
    SocialAccountStore::delete_account(&account.id).await?;

    if let Some(user) = UserStore::get_user(user_id).await? {
        if let Some(email) = user.email.as_deref() {
            send_mail(
                "socialaccount/email/account_disconnected",
                email,
                json!({
                    "user_display": user.display_name(),
                    "provider": account.provider,
                }),
            )
            .await?;
        }
    }

    tracing::info!(user_id = %user_id, provider = %provider, "Social account disconnected");
    Ok(account)
}
