//! Password accounts and email management

use serde_json::Map;

use super::auth_helpers::{
    UNVERIFIED_USER_SESSION_KEY, gate_sensitive_action, perform_login, require_anonymous,
    require_user,
};
use super::errors::CoordinationError;
use super::types::{EmailVerificationResult, LoginOutcome};
use crate::account::{
    self, ACCOUNT_EMAIL_VERIFICATION, AccountError, EmailAddress, EmailVerificationMode,
    SignupRequest, SignupResult,
};
use crate::session::{AuthenticationMethod, Session, SessionUser, save_session};
use crate::userdb::UserStore;

/// Create a password account and log it in when nothing blocks the login.
pub async fn signup_core(
    session: &mut Session,
    request: SignupRequest,
) -> Result<LoginOutcome, CoordinationError> {
    require_anonymous(session)?;
    let requested_email = request.email.clone().unwrap_or_default();

    let user = match account::signup(request).await? {
        SignupResult::Created(user) => user,
        // Looks the same as a fresh signup awaiting verification
        SignupResult::EnumerationHidden => {
            return Ok(LoginOutcome::VerificationRequired {
                email: requested_email,
            });
        }
    };

    // The signup already sent the verification mail
    if *ACCOUNT_EMAIL_VERIFICATION == EmailVerificationMode::Mandatory {
        if let Some(email) = user.email.clone() {
            session.set_data(UNVERIFIED_USER_SESSION_KEY, &user.id)?;
            save_session(session).await?;
            return Ok(LoginOutcome::VerificationRequired { email });
        }
    }

    perform_login(session, &user, AuthenticationMethod::Password, Map::new()).await
}

/// Log in with an email or username and a password.
pub async fn login_core(
    session: &mut Session,
    login: &str,
    password: &str,
) -> Result<LoginOutcome, CoordinationError> {
    let user = account::authenticate(login, password).await?;
    perform_login(session, &user, AuthenticationMethod::Password, Map::new()).await
}

/// Mail a one-time login code to `email`.
///
/// The outcome looks the same whether or not the address has an owner.
pub async fn request_login_code_core(
    session: &mut Session,
    email: &str,
) -> Result<(), CoordinationError> {
    require_anonymous(session)?;
    account::request_login_code(session, email).await?;
    Ok(())
}

/// Log in with the code mailed by [`request_login_code_core`].
pub async fn confirm_login_code_core(
    session: &mut Session,
    code: &str,
) -> Result<LoginOutcome, CoordinationError> {
    require_anonymous(session)?;
    let (user, email) = account::confirm_login_code(session, code).await?;
    let mut extra = Map::new();
    extra.insert("email".to_string(), email.into());
    perform_login(session, &user, AuthenticationMethod::Code, extra).await
}

pub async fn logout_core(session: &mut Session) -> Result<(), CoordinationError> {
    account::logout(session).await?;
    Ok(())
}

/// Confirm an email verification key.
///
/// When the same session was blocked from logging in by mandatory
/// verification, the login is completed here.
pub async fn verify_email_core(
    session: &mut Session,
    key: &str,
) -> Result<EmailVerificationResult, CoordinationError> {
    let email = account::confirm_email_verification(key).await?;

    let waiting = session.pop_data::<String>(UNVERIFIED_USER_SESSION_KEY)?;
    let login = match waiting {
        Some(user_id) if user_id == email.user_id && !session.is_authenticated() => {
            let user = UserStore::get_user(&user_id)
                .await?
                .ok_or_else(|| CoordinationError::Unauthorized.log())?;
            let mut extra = Map::new();
            extra.insert("email".to_string(), email.email.clone().into());
            Some(
                perform_login(session, &user, AuthenticationMethod::EmailVerification, extra)
                    .await?,
            )
        }
        Some(_) => {
            save_session(session).await?;
            None
        }
        None => None,
    };

    Ok(EmailVerificationResult { email, login })
}

pub async fn request_password_reset_core(email: &str) -> Result<(), CoordinationError> {
    account::request_password_reset(email).await?;
    Ok(())
}

/// The user a password reset key belongs to.
pub async fn password_reset_user_core(key: &str) -> Result<SessionUser, CoordinationError> {
    let user = account::password_reset_user(key).await?;
    Ok(SessionUser::from(user))
}

pub async fn reset_password_core(key: &str, password: &str) -> Result<(), CoordinationError> {
    account::reset_password(key, password).await?;
    Ok(())
}

/// Change the password, or set one for a user who has none.
pub async fn change_password_core(
    session: &mut Session,
    current_password: Option<&str>,
    new_password: &str,
) -> Result<SessionUser, CoordinationError> {
    let user = require_user(session).await?;
    let user = account::change_password(&user.id, current_password, new_password).await?;
    Ok(SessionUser::from(user))
}

pub async fn list_emails_core(session: &Session) -> Result<Vec<EmailAddress>, CoordinationError> {
    let user = require_user(session).await?;
    Ok(account::list_email_addresses(&user.id).await?)
}

pub async fn add_email_core(
    session: &Session,
    email: &str,
) -> Result<EmailAddress, CoordinationError> {
    let user = require_user(session).await?;
    gate_sensitive_action(session).await?;
    Ok(account::add_email_address(&user.id, email).await?)
}

pub async fn remove_email_core(session: &Session, email: &str) -> Result<(), CoordinationError> {
    let user = require_user(session).await?;
    gate_sensitive_action(session).await?;
    account::remove_email_address(&user.id, email).await?;
    Ok(())
}

pub async fn set_primary_email_core(
    session: &Session,
    email: &str,
) -> Result<EmailAddress, CoordinationError> {
    let user = require_user(session).await?;
    gate_sensitive_action(session).await?;
    Ok(account::set_primary_email(&user.id, email).await?)
}

/// Resend the verification mail for one of the user's addresses.
pub async fn resend_email_verification_core(
    session: &Session,
    email: &str,
) -> Result<(), CoordinationError> {
    let user = require_user(session).await?;
    let address = account::list_email_addresses(&user.id)
        .await?
        .into_iter()
        .find(|a| a.email.eq_ignore_ascii_case(email.trim()))
        .ok_or(AccountError::EmailNotFound)?;
    if address.verified {
        return Err(AccountError::validation("email", "This email address is already verified.").into());
    }
    account::send_email_verification(&user, &address.email).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{EmailAddressStore, hash_password};
    use crate::session::{create_session, load_session};
    use crate::test_utils::{init_test_environment, unique_name};
    use crate::userdb::User;
    use serial_test::serial;

    fn signup_request(email: &str, password: &str) -> SignupRequest {
        SignupRequest {
            email: Some(email.to_string()),
            username: None,
            password: password.to_string(),
            first_name: None,
            last_name: None,
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_signup_logs_in_and_logout_clears() {
        init_test_environment().await;
        let email = format!("{}@example.com", unique_name("signup"));
        let mut session = create_session().unwrap();

        let outcome = signup_core(&mut session, signup_request(&email, "long-enough-password"))
            .await
            .unwrap();
        let LoginOutcome::LoggedIn(user) = outcome else {
            panic!("expected login, got {outcome:?}");
        };
        assert_eq!(user.email.as_deref(), Some(email.as_str()));
        assert!(user.has_usable_password);
        assert_eq!(session.user_id(), Some(user.id.as_str()));

        assert!(matches!(
            signup_core(&mut session, signup_request("x@example.com", "long-enough-password")).await,
            Err(CoordinationError::UnexpectedlyAuthorized)
        ));

        let id = session.id().to_string();
        logout_core(&mut session).await.unwrap();
        assert!(load_session(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_login_with_wrong_password() {
        init_test_environment().await;
        let email = format!("{}@example.com", unique_name("login"));
        let mut user = User::new(None, Some(email.clone()));
        user.password_hash = Some(hash_password("right-password").unwrap());
        let user = UserStore::upsert_user(user).await.unwrap();
        EmailAddressStore::add_email(EmailAddress::new(&user.id, &email, true, true))
            .await
            .unwrap();

        let mut session = create_session().unwrap();
        let err = login_core(&mut session, &email, "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "email_password_mismatch");

        let outcome = login_core(&mut session, &email, "right-password")
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::LoggedIn(ref u) if u.id == user.id));
    }

    #[tokio::test]
    #[serial]
    async fn test_email_management_needs_login() {
        init_test_environment().await;
        let session = create_session().unwrap();
        assert!(matches!(
            list_emails_core(&session).await,
            Err(CoordinationError::Unauthorized)
        ));
        assert!(matches!(
            add_email_core(&session, "a@example.com").await,
            Err(CoordinationError::Unauthorized)
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_add_email_after_login() {
        init_test_environment().await;
        let email = format!("{}@example.com", unique_name("owner"));
        let extra = format!("{}@example.com", unique_name("extra"));
        let mut session = create_session().unwrap();
        signup_core(&mut session, signup_request(&email, "long-enough-password"))
            .await
            .unwrap();

        let added = add_email_core(&session, &extra).await.unwrap();
        assert!(!added.verified);
        let emails = list_emails_core(&session).await.unwrap();
        assert_eq!(emails.len(), 2);

        resend_email_verification_core(&session, &extra).await.unwrap();
        remove_email_core(&session, &extra).await.unwrap();
        assert_eq!(list_emails_core(&session).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_login_by_code_reports_pending_flow() {
        init_test_environment().await;
        let mailer = crate::account::test_mailer::install().await;
        let email = format!("{}@example.com", unique_name("bycode"));
        let user = UserStore::upsert_user(User::new(None, Some(email.clone())))
            .await
            .unwrap();
        EmailAddressStore::add_email(EmailAddress::new(&user.id, &email, true, true))
            .await
            .unwrap();

        let mut session = create_session().unwrap();
        request_login_code_core(&mut session, &email).await.unwrap();
        assert_eq!(
            crate::coordination::pending_flows(&session),
            vec![crate::coordination::PendingFlow::LoginByCode]
        );

        let ctx = mailer.last_for("account/email/login_code", &email).unwrap();
        let code = ctx["code"].as_str().unwrap().to_string();
        let outcome = confirm_login_code_core(&mut session, &code).await.unwrap();
        assert!(matches!(outcome, LoginOutcome::LoggedIn(ref u) if u.id == user.id));

        let record = session.authentication_records().last().unwrap();
        assert_eq!(record.method, AuthenticationMethod::Code);
        assert_eq!(record.extra["email"], email.as_str());
        assert!(crate::coordination::pending_flows(&session).is_empty());

        assert!(matches!(
            request_login_code_core(&mut session, &email).await,
            Err(CoordinationError::UnexpectedlyAuthorized)
        ));
    }
}
