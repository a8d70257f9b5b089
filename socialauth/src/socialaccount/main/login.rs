use chrono::Utc;

use crate::session::Session;
use crate::socialaccount::config::SOCIALACCOUNT_STORE_TOKENS;
use crate::socialaccount::errors::SocialError;
use crate::socialaccount::storage::SocialAccountStore;
use crate::socialaccount::types::{AuthProcess, SocialLogin, SocialLoginOutcome};
use crate::userdb::UserStore;

use super::connect::connect;
use super::signup::{clear_pending_signup, process_signup};

/// Match the login against stored bindings by (provider, uid).
///
/// On a hit the stored account keeps its id and owner while its provider data
/// and token are refreshed.
pub(crate) async fn lookup(login: &mut SocialLogin) -> Result<(), SocialError> {
    let Some(mut stored) =
        SocialAccountStore::get_by_provider_uid(&login.account.provider, &login.account.uid).await?
    else {
        login.is_existing = false;
        return Ok(());
    };

    stored.extra_data = login.account.extra_data.clone();
    stored.last_login = Utc::now();
    SocialAccountStore::update_account(&stored).await?;

    if let Some(token) = login.token.as_mut() {
        token.account_id = stored.id.clone();
        if *SOCIALACCOUNT_STORE_TOKENS {
            *token = SocialAccountStore::upsert_token(token).await?;
        }
    }

    let user = UserStore::get_user(&stored.user_id).await?.ok_or_else(|| {
        tracing::error!(account_id = %stored.id, "Social account without user");
        SocialError::InvalidData("Social account refers to a missing user".to_string())
    })?;

    login.user = user;
    login.account = stored;
    login.is_existing = true;
    Ok(())
}

/// Decide what a finished provider login means for the current session.
///
/// The returned outcome tells the caller whom to log in, if anyone; this
/// function never binds the session itself.
pub(crate) async fn complete_login(
    session: &mut Session,
    mut login: SocialLogin,
) -> Result<SocialLoginOutcome, SocialError> {
    clear_pending_signup(session);
    lookup(&mut login).await?;

    tracing::debug!(
        provider = %login.account.provider,
        process = ?login.state.process,
        existing = login.is_existing,
        "Completing social login"
    );

    match login.state.process {
        AuthProcess::Redirect => Ok(SocialLoginOutcome::Redirect {
            url: login.state.next.clone().unwrap_or_else(|| "/".to_string()),
        }),
        AuthProcess::Connect => {
            let user_id = session
                .user_id()
                .ok_or(SocialError::NotAuthenticated)?
                .to_string();
            connect(&user_id, login).await
        }
        AuthProcess::Login if login.is_existing => {
            if !login.user.is_active {
                tracing::warn!(user_id = %login.user.id, "Social login for inactive account");
                return Err(crate::account::AccountError::Inactive.into());
            }
            Ok(SocialLoginOutcome::LoggedIn(login.user))
        }
        AuthProcess::Login => process_signup(session, login).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::create_session;
    use crate::socialaccount::test_support::sample_login;
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::User;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_second_login_finds_existing_account() {
        init_test_environment().await;
        let uid = unique_name("gh");
        let email = format!("{uid}@example.com");

        let mut session = create_session().unwrap();
        let outcome = complete_login(&mut session, sample_login("github", &uid, &email, true))
            .await
            .unwrap();
        let SocialLoginOutcome::SignedUp(user) = outcome else {
            panic!("expected signup, got {outcome:?}");
        };
        assert!(!user.has_usable_password());

        let mut session = create_session().unwrap();
        let outcome = complete_login(&mut session, sample_login("github", &uid, &email, true))
            .await
            .unwrap();
        let SocialLoginOutcome::LoggedIn(again) = outcome else {
            panic!("expected login, got {outcome:?}");
        };
        assert_eq!(again.id, user.id);
    }

    #[tokio::test]
    #[serial]
    async fn test_lookup_refreshes_extra_data_without_moving_owner() {
        init_test_environment().await;
        let uid = unique_name("gl");
        let owner = UserStore::upsert_user(User::new(None, None)).await.unwrap();

        let mut account = crate::socialaccount::types::SocialAccount::new(
            "gitlab",
            &uid,
            serde_json::json!({"v": 1}),
        );
        account.user_id = owner.id.clone();
        SocialAccountStore::insert_account(&account).await.unwrap();

        let mut login = sample_login("gitlab", &uid, "someone@example.com", true);
        login.account.extra_data = serde_json::json!({"v": 2});
        lookup(&mut login).await.unwrap();

        assert!(login.is_existing);
        assert_eq!(login.user.id, owner.id);
        assert_eq!(login.account.id, account.id);
        let stored = SocialAccountStore::get_account(&account.id).await.unwrap().unwrap();
        assert_eq!(stored.extra_data["v"], 2);
        assert_eq!(stored.user_id, owner.id);
    }

    #[tokio::test]
    #[serial]
    async fn test_redirect_process_does_not_log_in() {
        init_test_environment().await;
        let mut login = sample_login("discord", &unique_name("d"), "r@example.com", true);
        login.state.process = AuthProcess::Redirect;
        login.state.next = Some("/after".to_string());

        let mut session = create_session().unwrap();
        let outcome = complete_login(&mut session, login).await.unwrap();
        assert!(matches!(outcome, SocialLoginOutcome::Redirect { url } if url == "/after"));
    }

    #[tokio::test]
    #[serial]
    async fn test_connect_requires_authenticated_session() {
        init_test_environment().await;
        let mut login = sample_login("github", &unique_name("c"), "c@example.com", true);
        login.state.process = AuthProcess::Connect;

        let mut session = create_session().unwrap();
        let result = complete_login(&mut session, login).await;
        assert!(matches!(result, Err(SocialError::NotAuthenticated)));
    }
}
