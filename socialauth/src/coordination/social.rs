//! Provider login, signup, connect and disconnect

use super::auth_helpers::{gate_sensitive_action, perform_login, require_user, safe_next};
use super::errors::CoordinationError;
use super::types::{
    LoginOutcome, ProviderCallbackOutcome, ProviderCallbackResult, ProviderRedirectRequest,
};
use crate::account::AccountError;
use crate::providers::{self, CallbackParams};
use crate::reauth::{
    ACCOUNT_REAUTHENTICATION_REQUIRED, ResumeState, did_recently_authenticate,
    stash_and_reauthenticate,
};
use crate::session::{AuthenticationMethod, Session, save_session};
use crate::socialaccount::{self, AuthProcess, LoginState, SocialAccount, SocialLogin, SocialLoginOutcome};

/// Start a provider login or connect and return the provider's authorization URL.
///
/// The session is persisted so the callback can be matched against it.
pub async fn provider_redirect_core(
    session: &mut Session,
    request: ProviderRedirectRequest,
) -> Result<String, CoordinationError> {
    if request.process == AuthProcess::Connect {
        require_user(session).await?;
    }

    let state = LoginState {
        process: request.process,
        next: safe_next(request.next.as_deref()),
        scope: request.scope,
        auth_params: request.auth_params,
    };

    save_session(session).await?;
    let url = providers::begin_login(&request.provider, state, session).await?;
    tracing::debug!(provider = %request.provider, "Redirecting to provider");
    Ok(url)
}

/// Handle the provider's redirect back to us.
pub async fn provider_callback_core(
    session: &mut Session,
    provider_id: &str,
    params: &CallbackParams,
) -> Result<ProviderCallbackResult, CoordinationError> {
    let login = providers::finish_login(provider_id, params, session).await?;
    let next = login.state.next.clone();

    if login.state.process == AuthProcess::Connect {
        require_user(session).await?;
        if *ACCOUNT_REAUTHENTICATION_REQUIRED && !did_recently_authenticate(session).await? {
            let url =
                stash_and_reauthenticate(session, ResumeState::SocialConnect(Box::new(login)))
                    .await?;
            return Ok(ProviderCallbackResult {
                outcome: ProviderCallbackOutcome::ReauthenticationRequired { url },
                next,
            });
        }
    }

    let outcome = complete_social_login(session, login).await?;
    Ok(ProviderCallbackResult { outcome, next })
}

/// Run the reconciliation and log in whoever it settled on.
pub(super) async fn complete_social_login(
    session: &mut Session,
    login: SocialLogin,
) -> Result<ProviderCallbackOutcome, CoordinationError> {
    let extra = login.authentication_extra();
    let outcome = socialaccount::complete_login(session, login).await?;
    social_outcome(session, outcome, extra).await
}

async fn social_outcome(
    session: &mut Session,
    outcome: SocialLoginOutcome,
    extra: serde_json::Map<String, serde_json::Value>,
) -> Result<ProviderCallbackOutcome, CoordinationError> {
    Ok(match outcome {
        SocialLoginOutcome::LoggedIn(user) | SocialLoginOutcome::SignedUp(user) => {
            let outcome =
                perform_login(session, &user, AuthenticationMethod::Socialaccount, extra).await?;
            ProviderCallbackOutcome::Login(outcome)
        }
        SocialLoginOutcome::Connected(account) => ProviderCallbackOutcome::Connected(account),
        SocialLoginOutcome::AlreadyConnected(account) => {
            ProviderCallbackOutcome::AlreadyConnected(account)
        }
        SocialLoginOutcome::SignupRequired => ProviderCallbackOutcome::SignupRequired,
        SocialLoginOutcome::ConnectedToOther => ProviderCallbackOutcome::ConnectedToOther,
        SocialLoginOutcome::SignupClosed => ProviderCallbackOutcome::SignupClosed,
        SocialLoginOutcome::DuplicateEmail { email } => {
            ProviderCallbackOutcome::DuplicateEmail { email }
        }
        // Indistinguishable from a signup waiting for verification
        SocialLoginOutcome::EnumerationHidden { email } => {
            ProviderCallbackOutcome::Login(LoginOutcome::VerificationRequired { email })
        }
        SocialLoginOutcome::Redirect { url } => ProviderCallbackOutcome::Redirect { url },
        SocialLoginOutcome::ReauthenticationRequired { url } => {
            ProviderCallbackOutcome::ReauthenticationRequired { url }
        }
    })
}

/// The social login waiting for signup input.
pub async fn pending_signup_core(session: &Session) -> Result<SocialLogin, CoordinationError> {
    Ok(socialaccount::pending_signup(session)?.ok_or(socialaccount::SocialError::NoPendingSignup)?)
}

/// Finish a pending social signup with the address the user picked.
pub async fn social_signup_core(
    session: &mut Session,
    email: Option<&str>,
    username: Option<&str>,
) -> Result<LoginOutcome, CoordinationError> {
    let pending = pending_signup_core(session).await?;
    let extra = pending.authentication_extra();

    match socialaccount::signup_with_email(session, email, username).await? {
        SocialLoginOutcome::SignedUp(user) => {
            perform_login(session, &user, AuthenticationMethod::Socialaccount, extra).await
        }
        SocialLoginOutcome::SignupClosed => Err(AccountError::SignupClosed.into()),
        other => Err(CoordinationError::InvalidState(format!(
            "Unexpected social signup outcome: {other:?}"
        ))),
    }
}

pub async fn list_social_accounts_core(
    session: &Session,
) -> Result<Vec<SocialAccount>, CoordinationError> {
    let user = require_user(session).await?;
    Ok(socialaccount::list_accounts(&user.id).await?)
}

/// Remove one of the user's provider bindings.
pub async fn disconnect_social_account_core(
    session: &Session,
    provider: &str,
    uid: &str,
) -> Result<SocialAccount, CoordinationError> {
    let user = require_user(session).await?;
    gate_sensitive_action(session).await?;
    let account = socialaccount::disconnect(&user.id, provider, uid).await?;
    tracing::info!(user_id = %user.id, provider = %provider, "Social account disconnected");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::hash_password;
    use crate::session::{create_session, login_session};
    use crate::socialaccount::test_support::sample_login;
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::{User, UserStore};
    use chrono::Duration;
    use serde_json::Map;
    use serial_test::serial;

    async fn password_user_session() -> (User, Session) {
        let mut user = User::new(Some(unique_name("pw")), None);
        user.password_hash = Some(hash_password("password-123").unwrap());
        let user = UserStore::upsert_user(user).await.unwrap();
        let mut session = create_session().unwrap();
        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();
        (user, session)
    }

    #[tokio::test]
    #[serial]
    async fn test_social_signup_logs_in_with_social_record() {
        init_test_environment().await;
        let uid = unique_name("gh");
        let mut session = create_session().unwrap();

        let outcome = complete_social_login(
            &mut session,
            sample_login("github", &uid, &format!("{uid}@example.com"), true),
        )
        .await
        .unwrap();
        let ProviderCallbackOutcome::Login(LoginOutcome::LoggedIn(user)) = outcome else {
            panic!("expected login, got {outcome:?}");
        };
        assert_eq!(session.user_id(), Some(user.id.as_str()));
        let record = session.authentication_records().last().unwrap();
        assert_eq!(record.method, AuthenticationMethod::Socialaccount);
        assert_eq!(record.extra["provider"], "github");
        assert_eq!(record.extra["uid"], uid.as_str());
    }

    #[tokio::test]
    #[serial]
    async fn test_connect_owned_by_other_user_is_refused() {
        init_test_environment().await;
        let uid = unique_name("gh");

        // User A owns the identity
        let mut session_a = create_session().unwrap();
        complete_social_login(
            &mut session_a,
            sample_login("github", &uid, &format!("{uid}@example.com"), true),
        )
        .await
        .unwrap();
        let owner = session_a.user_id().unwrap().to_string();

        // User B tries to connect it
        let (_, mut session_b) = password_user_session().await;
        let mut login = sample_login("github", &uid, &format!("{uid}@example.com"), true);
        login.state.process = AuthProcess::Connect;
        let outcome = complete_social_login(&mut session_b, login).await.unwrap();
        assert!(matches!(outcome, ProviderCallbackOutcome::ConnectedToOther));

        let accounts = socialaccount::list_accounts(&owner).await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].uid, uid);
    }

    #[tokio::test]
    #[serial]
    async fn test_disconnect_gated_by_reauthentication() {
        init_test_environment().await;
        let (user, mut session) = password_user_session().await;
        let uid = unique_name("gl");
        let mut login = sample_login("gitlab", &uid, &format!("{uid}@example.com"), true);
        login.state.process = AuthProcess::Connect;
        let outcome = complete_social_login(&mut session, login).await.unwrap();
        assert!(matches!(outcome, ProviderCallbackOutcome::Connected(_)));

        for record in session.stored.authentication_records.iter_mut() {
            record.at = record.at - Duration::seconds(3600);
        }
        let err = disconnect_social_account_core(&session, "gitlab", &uid)
            .await
            .unwrap_err();
        assert!(err.is_reauthentication_required());

        for record in session.stored.authentication_records.iter_mut() {
            record.at = chrono::Utc::now();
        }
        let removed = disconnect_social_account_core(&session, "gitlab", &uid)
            .await
            .unwrap();
        assert_eq!(removed.user_id, user.id);
        assert!(list_social_accounts_core(&session).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn test_pending_signup_missing() {
        init_test_environment().await;
        let mut session = create_session().unwrap();
        let err = social_signup_core(&mut session, Some("a@example.com"), None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "no_pending_signup");
    }
}
