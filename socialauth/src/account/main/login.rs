use serde_json::{Map, Value};

use crate::account::config::ACCOUNT_EMAIL_VERIFICATION;
use crate::account::errors::AccountError;
use crate::account::storage::EmailAddressStore;
use crate::account::types::EmailVerificationMode;
use crate::session::{AuthenticationMethod, Session, login_session, logout_session};
use crate::userdb::User;

use super::email_verification::send_email_verification;

/// Bind `user` to the session, rotating its id and recording `method`.
pub(crate) async fn login(
    session: &mut Session,
    user: &User,
    method: AuthenticationMethod,
    extra: Map<String, Value>,
) -> Result<(), AccountError> {
    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Refusing login for inactive account");
        return Err(AccountError::Inactive);
    }
    login_session(session, &user.id, method, extra).await?;
    Ok(())
}

pub(crate) async fn logout(session: &mut Session) -> Result<(), AccountError> {
    logout_session(session).await?;
    Ok(())
}

/// Returns the address a verification mail was sent to when mandatory
/// verification blocks this user from logging in.
pub(crate) async fn pending_email_verification(user: &User) -> Result<Option<String>, AccountError> {
    if *ACCOUNT_EMAIL_VERIFICATION != EmailVerificationMode::Mandatory {
        return Ok(None);
    }
    if EmailAddressStore::has_verified_email(&user.id).await? {
        return Ok(None);
    }

    let email = match EmailAddressStore::get_primary(&user.id).await? {
        Some(address) => Some(address.email),
        None => user.email.clone(),
    };
    let Some(email) = email else {
        return Err(AccountError::UnverifiedEmail);
    };

    send_email_verification(user, &email).await?;
    Ok(Some(email))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{create_session, load_session};
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::UserStore;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_login_renews_and_binds_session() {
        init_test_environment().await;
        let user = UserStore::upsert_user(User::new(Some(unique_name("login")), None))
            .await
            .unwrap();

        let mut session = create_session().unwrap();
        let anonymous_id = session.id().to_string();

        login(&mut session, &user, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();

        assert_ne!(session.id(), anonymous_id);
        assert_eq!(session.user_id(), Some(user.id.as_str()));
        assert_eq!(session.authentication_records().len(), 1);

        let stored = load_session(session.id()).await.unwrap().unwrap();
        assert_eq!(stored.user_id(), Some(user.id.as_str()));

        let id = session.id().to_string();
        logout(&mut session).await.unwrap();
        assert!(!session.is_authenticated());
        assert!(load_session(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_login_rejects_inactive_user() {
        init_test_environment().await;
        let mut user = User::new(Some(unique_name("inactive")), None);
        user.is_active = false;
        let user = UserStore::upsert_user(user).await.unwrap();

        let mut session = create_session().unwrap();
        let result = login(&mut session, &user, AuthenticationMethod::Password, Map::new()).await;
        assert!(matches!(result, Err(AccountError::Inactive)));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    #[serial]
    async fn test_pending_verification_is_none_when_optional() {
        init_test_environment().await;
        let user = UserStore::upsert_user(User::new(None, Some("optional@example.com".into())))
            .await
            .unwrap();
        assert_eq!(pending_email_verification(&user).await.unwrap(), None);
    }
}
