//! Listing and ending a user's logged-in sessions

use super::auth_helpers::require_user;
use super::errors::CoordinationError;
use crate::account;
use crate::session::{self, Session, UserSession};

/// The caller's live sessions, oldest first, with the requesting one marked.
pub async fn list_user_sessions_core(
    session: &Session,
) -> Result<Vec<UserSession>, CoordinationError> {
    let user = require_user(session).await?;
    Ok(session::list_user_sessions(&user.id, session.id()).await?)
}

/// End the caller's sessions named by entry id and return what is left.
///
/// Ending the requesting session logs it out; the result is then empty
/// and the caller should clear the client's cookie.
pub async fn end_user_sessions_core(
    session: &mut Session,
    ids: &[String],
) -> Result<Vec<UserSession>, CoordinationError> {
    let user = require_user(session).await?;
    let ended = session::end_user_sessions(&user.id, ids).await?;

    if ended.iter().any(|key| key == session.id()) {
        account::logout(session).await?;
        return Ok(Vec::new());
    }
    Ok(session::list_user_sessions(&user.id, session.id()).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::login_core;
    use crate::account::{EmailAddress, EmailAddressStore, hash_password};
    use crate::session::{ClientInfo, create_session, load_session};
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::{User, UserStore};
    use serial_test::serial;

    async fn password_user() -> String {
        let email = format!("{}@example.com", unique_name("devices"));
        let mut user = User::new(None, Some(email.clone()));
        user.password_hash = Some(hash_password("device-password").unwrap());
        let user = UserStore::upsert_user(user).await.unwrap();
        EmailAddressStore::add_email(EmailAddress::new(&user.id, &email, true, true))
            .await
            .unwrap();
        email
    }

    async fn login_from(email: &str, user_agent: &str) -> Session {
        let mut session = create_session().unwrap();
        session.set_client(ClientInfo {
            ip: None,
            user_agent: Some(user_agent.to_string()),
        });
        login_core(&mut session, email, "device-password")
            .await
            .unwrap();
        session
    }

    #[tokio::test]
    #[serial]
    async fn test_end_other_session() {
        init_test_environment().await;
        let email = password_user().await;
        let laptop = login_from(&email, "laptop").await;
        let phone = login_from(&email, "phone").await;

        let listed = list_user_sessions_core(&laptop).await.unwrap();
        assert_eq!(listed.len(), 2);
        let phone_entry = listed.iter().find(|s| !s.is_current).unwrap();
        assert_eq!(phone_entry.user_agent.as_deref(), Some("phone"));

        let mut laptop = laptop;
        let left = end_user_sessions_core(&mut laptop, &[phone_entry.id.clone()])
            .await
            .unwrap();
        assert_eq!(left.len(), 1);
        assert!(left[0].is_current);
        assert!(load_session(phone.id()).await.unwrap().is_none());
        assert!(laptop.is_authenticated());
    }

    #[tokio::test]
    #[serial]
    async fn test_end_current_session_logs_out() {
        init_test_environment().await;
        let email = password_user().await;
        let mut session = login_from(&email, "only").await;
        let id = session.id().to_string();

        let current = list_user_sessions_core(&session).await.unwrap();
        let left = end_user_sessions_core(&mut session, &[current[0].id.clone()])
            .await
            .unwrap();

        assert!(left.is_empty());
        assert!(!session.is_authenticated());
        assert!(load_session(&id).await.unwrap().is_none());
        assert!(matches!(
            list_user_sessions_core(&session).await,
            Err(CoordinationError::Unauthorized)
        ));
    }
}
