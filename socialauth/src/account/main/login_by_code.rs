use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::account::config::{
    ACCOUNT_LOGIN_BY_CODE_ENABLED, ACCOUNT_LOGIN_BY_CODE_MAX_ATTEMPTS,
    ACCOUNT_LOGIN_BY_CODE_TIMEOUT, ACCOUNT_SIGNUP_OPEN,
};
use crate::account::errors::AccountError;
use crate::account::mailer::send_mail;
use crate::account::storage::EmailAddressStore;
use crate::config::{ORIGIN, SA_ROUTE_PREFIX};
use crate::session::{Session, save_session};
use crate::userdb::{User, UserSearchField, UserStore};
use crate::utils::gen_random_bytes;

use super::signup::validate_email;

pub(crate) const LOGIN_CODE_SESSION_KEY: &str = "account.login_code";

const CODE_LENGTH: usize = 6;
// 32 symbols, so a random byte maps onto it without bias
const CODE_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// A login code mailed to `email`, waiting in the session for confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PendingLoginCode {
    pub(crate) email: String,
    /// `None` when nobody owns the address; such a code never matches
    pub(crate) user_id: Option<String>,
    code: String,
    at: DateTime<Utc>,
    #[serde(default)]
    failed_attempts: u32,
}

fn generate_login_code() -> Result<String, AccountError> {
    let bytes = gen_random_bytes(CODE_LENGTH)?;
    Ok(bytes
        .iter()
        .map(|b| CODE_ALPHABET[(*b as usize) % CODE_ALPHABET.len()] as char)
        .collect())
}

/// Upper case with separators dropped, as users retype codes loosely.
fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

async fn find_user_by_email(email: &str) -> Result<Option<User>, AccountError> {
    for address in EmailAddressStore::find_by_email(email).await? {
        if let Some(user) = UserStore::get_user(&address.user_id).await? {
            return Ok(Some(user));
        }
    }
    Ok(UserStore::get_user_by(UserSearchField::Email(email.to_string())).await?)
}

/// Mail a one-time login code for `email` and park it in the session.
///
/// An address without an active owner gets an "unknown account" mail
/// instead, while the session looks the same as for a known one.
pub(crate) async fn request_login_code(
    session: &mut Session,
    email: &str,
) -> Result<(), AccountError> {
    if !*ACCOUNT_LOGIN_BY_CODE_ENABLED {
        return Err(AccountError::LoginByCodeDisabled);
    }
    let email = validate_email(email)?;
    let user = find_user_by_email(&email).await?.filter(|u| u.is_active);
    let code = generate_login_code()?;

    match &user {
        Some(user) => {
            send_mail(
                "account/email/login_code",
                &email,
                json!({
                    "user_display": user.display_name(),
                    "code": code,
                }),
            )
            .await?;
            tracing::info!(user_id = %user.id, "Login code sent");
        }
        None => {
            let signup_url = ACCOUNT_SIGNUP_OPEN.then(|| {
                format!("{}{}/signup/", ORIGIN.as_str(), SA_ROUTE_PREFIX.as_str())
            });
            send_mail(
                "account/email/unknown_account",
                &email,
                json!({ "email": email, "signup_url": signup_url }),
            )
            .await?;
            tracing::info!("Login code requested for unknown address");
        }
    }

    let pending = PendingLoginCode {
        email,
        user_id: user.map(|u| u.id),
        code,
        at: Utc::now(),
        failed_attempts: 0,
    };
    session.set_data(LOGIN_CODE_SESSION_KEY, &pending)?;
    save_session(session).await?;
    Ok(())
}

/// The requested code, if one is waiting and has not timed out.
pub(crate) fn pending_login_code(
    session: &Session,
) -> Result<Option<PendingLoginCode>, AccountError> {
    let Some(pending) = session.get_data::<PendingLoginCode>(LOGIN_CODE_SESSION_KEY)? else {
        return Ok(None);
    };
    if pending.at + Duration::seconds(*ACCOUNT_LOGIN_BY_CODE_TIMEOUT) < Utc::now() {
        tracing::debug!("Login code timed out");
        return Ok(None);
    }
    Ok(Some(pending))
}

/// Check `code` against the pending one and return the user it logs in,
/// with the address the code went to.
///
/// Each miss counts; at the attempt limit the pending code is dropped and
/// a new one has to be requested. The caller binds the returned user to
/// the session.
pub(crate) async fn confirm_login_code(
    session: &mut Session,
    code: &str,
) -> Result<(User, String), AccountError> {
    let Some(mut pending) = pending_login_code(session)? else {
        session.remove_data(LOGIN_CODE_SESSION_KEY);
        return Err(AccountError::NoPendingLoginCode);
    };

    let matches: bool = normalize_code(code)
        .as_bytes()
        .ct_eq(pending.code.as_bytes())
        .into();

    if let (true, Some(user_id)) = (matches, pending.user_id.as_deref()) {
        session.remove_data(LOGIN_CODE_SESSION_KEY);
        let user = UserStore::get_user(user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AccountError::Inactive)?;

        // Receiving the code proves control of the mailbox
        match EmailAddressStore::mark_verified(&user.id, &pending.email).await {
            Ok(()) | Err(AccountError::EmailNotFound) => {}
            Err(e) => return Err(e),
        }
        tracing::info!(user_id = %user.id, "Login code confirmed");
        return Ok((user, pending.email));
    }

    pending.failed_attempts += 1;
    if pending.failed_attempts >= *ACCOUNT_LOGIN_BY_CODE_MAX_ATTEMPTS {
        session.remove_data(LOGIN_CODE_SESSION_KEY);
        save_session(session).await?;
        tracing::warn!("Login code attempts exhausted");
        return Err(AccountError::TooManyCodeAttempts);
    }
    session.set_data(LOGIN_CODE_SESSION_KEY, &pending)?;
    save_session(session).await?;
    tracing::warn!(attempts = pending.failed_attempts, "Incorrect login code");
    Err(AccountError::IncorrectCode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::mailer::test_mailer;
    use crate::account::types::EmailAddress;
    use crate::session::create_session;
    use crate::test_utils::{init_test_environment, unique_name};
    use serial_test::serial;

    async fn user_with_address(verified: bool) -> (User, String) {
        let email = format!("{}@example.com", unique_name("code"));
        let user = UserStore::upsert_user(User::new(None, Some(email.clone())))
            .await
            .unwrap();
        EmailAddressStore::add_email(EmailAddress::new(&user.id, &email, verified, true))
            .await
            .unwrap();
        (user, email)
    }

    #[test]
    fn test_generated_code_shape() {
        let code = generate_login_code().unwrap();
        assert_eq!(code.len(), CODE_LENGTH);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(normalize_code(" ab3-d5f "), "AB3D5F");
    }

    #[tokio::test]
    #[serial]
    async fn test_code_logs_in_and_verifies_address() {
        init_test_environment().await;
        let mailer = test_mailer::install().await;
        let (user, email) = user_with_address(false).await;

        let mut session = create_session().unwrap();
        request_login_code(&mut session, &email.to_uppercase())
            .await
            .unwrap();
        let pending = pending_login_code(&session).unwrap().unwrap();
        assert_eq!(pending.user_id.as_deref(), Some(user.id.as_str()));

        let ctx = mailer.last_for("account/email/login_code", &email).unwrap();
        let code = ctx["code"].as_str().unwrap().to_lowercase();

        let (logged_in, address) = confirm_login_code(&mut session, &code).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(address, email);
        assert!(pending_login_code(&session).unwrap().is_none());
        assert!(EmailAddressStore::has_verified_email(&user.id).await.unwrap());

        // Consumed
        assert!(matches!(
            confirm_login_code(&mut session, &code).await,
            Err(AccountError::NoPendingLoginCode)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_attempts_run_out() {
        init_test_environment().await;
        let mailer = test_mailer::install().await;
        let (_, email) = user_with_address(true).await;

        let mut session = create_session().unwrap();
        request_login_code(&mut session, &email).await.unwrap();
        let ctx = mailer.last_for("account/email/login_code", &email).unwrap();
        let code = ctx["code"].as_str().unwrap().to_string();

        for _ in 1..*ACCOUNT_LOGIN_BY_CODE_MAX_ATTEMPTS {
            assert!(matches!(
                confirm_login_code(&mut session, "WRONG1").await,
                Err(AccountError::IncorrectCode)
            ));
        }
        assert!(matches!(
            confirm_login_code(&mut session, "WRONG1").await,
            Err(AccountError::TooManyCodeAttempts)
        ));
        // The right code is useless once the pending login is gone
        assert!(matches!(
            confirm_login_code(&mut session, &code).await,
            Err(AccountError::NoPendingLoginCode)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_address_looks_pending_but_never_matches() {
        init_test_environment().await;
        let mailer = test_mailer::install().await;
        let email = format!("{}@example.com", unique_name("nobody"));

        let mut session = create_session().unwrap();
        request_login_code(&mut session, &email).await.unwrap();

        assert!(mailer.last_for("account/email/login_code", &email).is_none());
        let ctx = mailer
            .last_for("account/email/unknown_account", &email)
            .unwrap();
        assert_eq!(ctx["email"], email.as_str());

        let pending = pending_login_code(&session).unwrap().unwrap();
        assert!(pending.user_id.is_none());
        let stored_code = pending.code.clone();
        assert!(matches!(
            confirm_login_code(&mut session, &stored_code).await,
            Err(AccountError::IncorrectCode)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_expired_code_is_not_pending() {
        init_test_environment().await;
        let mut session = create_session().unwrap();
        let stale = PendingLoginCode {
            email: "old@example.com".to_string(),
            user_id: Some("someone".to_string()),
            code: "ABCDEF".to_string(),
            at: Utc::now() - Duration::seconds(*ACCOUNT_LOGIN_BY_CODE_TIMEOUT + 1),
            failed_attempts: 0,
        };
        session.set_data(LOGIN_CODE_SESSION_KEY, &stale).unwrap();

        assert!(pending_login_code(&session).unwrap().is_none());
        assert!(matches!(
            confirm_login_code(&mut session, "ABCDEF").await,
            Err(AccountError::NoPendingLoginCode)
        ));
        assert!(!session.has_data(LOGIN_CODE_SESSION_KEY));
    }
}
