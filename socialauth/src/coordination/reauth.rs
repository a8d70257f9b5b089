//! Reauthentication and what resumes after it

use super::auth_helpers::{require_user, safe_next};
use super::errors::CoordinationError;
use super::social::complete_social_login;
use super::types::{ProviderCallbackResult, ReauthenticationResult};
use crate::reauth::{
    ResumeAction, ResumeState, reauthenticate_with_password, reauthenticate_with_totp,
    resume_request,
};
use crate::session::Session;

/// Confirm the password of the logged in user and resume what was waiting.
pub async fn reauthenticate_core(
    session: &mut Session,
    password: &str,
    next: Option<&str>,
) -> Result<ReauthenticationResult, CoordinationError> {
    require_user(session).await?;
    reauthenticate_with_password(session, password).await?;
    resume(session, next).await
}

/// Same as [`reauthenticate_core`] with a TOTP or recovery code.
pub async fn reauthenticate_mfa_core(
    session: &mut Session,
    code: &str,
    next: Option<&str>,
) -> Result<ReauthenticationResult, CoordinationError> {
    require_user(session).await?;
    reauthenticate_with_totp(session, code).await?;
    resume(session, next).await
}

async fn resume(
    session: &mut Session,
    next: Option<&str>,
) -> Result<ReauthenticationResult, CoordinationError> {
    let next = safe_next(next);
    Ok(match resume_request(session, next.as_deref()).await? {
        ResumeAction::Replay(request) => ReauthenticationResult::Replay(request),
        ResumeAction::Continue(ResumeState::SocialConnect(login)) => {
            let next = login.state.next.clone();
            let outcome = complete_social_login(session, *login).await?;
            ReauthenticationResult::Connected(ProviderCallbackResult { outcome, next })
        }
        ResumeAction::Redirect(url) => ReauthenticationResult::Redirect(url),
        ResumeAction::None => ReauthenticationResult::Done,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::hash_password;
    use crate::coordination::types::ProviderCallbackOutcome;
    use crate::reauth::{StashedRequest, stash_and_reauthenticate, suspend_request};
    use crate::session::{AuthenticationMethod, create_session, login_session};
    use crate::socialaccount::AuthProcess;
    use crate::socialaccount::test_support::sample_login;
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::{User, UserStore};
    use serde_json::Map;
    use serial_test::serial;

    async fn logged_in() -> Session {
        let mut user = User::new(Some(unique_name("re")), None);
        user.password_hash = Some(hash_password("password-123").unwrap());
        let user = UserStore::upsert_user(user).await.unwrap();
        let mut session = create_session().unwrap();
        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    #[serial]
    async fn test_reauthenticate_replays_suspended_post() {
        init_test_environment().await;
        let mut session = logged_in().await;
        let request = StashedRequest::new(
            "POST",
            "/accounts/3rdparty/disconnect/",
            None,
            Some("application/x-www-form-urlencoded"),
            b"provider=gitlab&uid=1",
        );
        suspend_request(&mut session, request.clone()).await.unwrap();

        let err = reauthenticate_core(&mut session, "nope", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "incorrect_password");

        let result =
            reauthenticate_core(&mut session, "password-123", Some("/accounts/3rdparty/disconnect/"))
                .await
                .unwrap();
        assert!(matches!(result, ReauthenticationResult::Replay(ref r) if *r == request));
    }

    #[tokio::test]
    #[serial]
    async fn test_reauthenticate_finishes_pending_connect() {
        init_test_environment().await;
        let mut session = logged_in().await;
        let uid = unique_name("gh");
        let mut login = sample_login("github", &uid, &format!("{uid}@example.com"), true);
        login.state.process = AuthProcess::Connect;
        login.state.next = Some("/settings".to_string());
        stash_and_reauthenticate(&mut session, ResumeState::SocialConnect(Box::new(login)))
            .await
            .unwrap();

        let result = reauthenticate_core(&mut session, "password-123", None)
            .await
            .unwrap();
        let ReauthenticationResult::Connected(result) = result else {
            panic!("expected connect, got {result:?}");
        };
        assert_eq!(result.next.as_deref(), Some("/settings"));
        assert!(matches!(
            result.outcome,
            ProviderCallbackOutcome::Connected(ref a) if a.uid == uid
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_reauthenticate_without_stash_is_done() {
        init_test_environment().await;
        let mut session = logged_in().await;
        let result = reauthenticate_core(&mut session, "password-123", None)
            .await
            .unwrap();
        assert!(matches!(result, ReauthenticationResult::Done));

        let anonymous = &mut create_session().unwrap();
        assert!(matches!(
            reauthenticate_core(anonymous, "password-123", None).await,
            Err(CoordinationError::Unauthorized)
        ));
    }
}
