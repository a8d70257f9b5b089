//! Second factor management and the MFA login stage

use super::auth_helpers::require_user;
use super::errors::CoordinationError;
use super::types::{RecoveryCodes, TotpActivation, TotpSetup};
use crate::account;
use crate::mfa::{
    self, Authenticator, AuthenticatorStore, AuthenticatorType, MFA_RECOVERY_CODE_COUNT,
    MFA_TOTP_ISSUER, MfaError,
};
use crate::reauth::raise_if_reauthentication_required;
use crate::session::{AuthenticationMethod, Session, SessionUser, record_authentication, save_session};
use crate::userdb::{User, UserStore};

/// Authenticator changes always need a recent authentication.
async fn require_recent_user(session: &Session) -> Result<User, CoordinationError> {
    let user = require_user(session).await?;
    raise_if_reauthentication_required(session).await?;
    Ok(user)
}

pub async fn list_authenticators_core(
    session: &Session,
) -> Result<Vec<Authenticator>, CoordinationError> {
    let user = require_user(session).await?;
    Ok(AuthenticatorStore::get_authenticators(&user.id).await?)
}

/// Secret and provisioning URL for a TOTP authenticator about to be added.
pub async fn totp_setup_core(session: &mut Session) -> Result<TotpSetup, CoordinationError> {
    let user = require_user(session).await?;
    if AuthenticatorStore::get_authenticator(&user.id, AuthenticatorType::Totp)
        .await?
        .is_some()
    {
        return Err(MfaError::AlreadyActive.into());
    }

    let secret = mfa::get_totp_secret(session, false)?;
    save_session(session).await?;

    let label = user
        .email
        .clone()
        .or_else(|| user.username.clone())
        .unwrap_or_else(|| user.id.clone());
    let totp_url = mfa::build_totp_url(&label, MFA_TOTP_ISSUER.as_str(), &secret);
    Ok(TotpSetup { secret, totp_url })
}

pub async fn totp_activate_core(
    session: &mut Session,
    code: &str,
) -> Result<TotpActivation, CoordinationError> {
    let user = require_recent_user(session).await?;
    let (authenticator, recovery) = mfa::activate_totp(session, &user.id, code).await?;
    let recovery_codes = mfa::unused_codes(&recovery)?;
    account::send_notification_mail("mfa/email/totp_activated", &user).await?;
    Ok(TotpActivation {
        authenticator,
        recovery_codes,
    })
}

pub async fn totp_deactivate_core(session: &Session) -> Result<(), CoordinationError> {
    let user = require_recent_user(session).await?;
    mfa::deactivate_totp(&user.id).await?;
    account::send_notification_mail("mfa/email/totp_deactivated", &user).await?;
    Ok(())
}

async fn recovery_codes_view(authenticator: Authenticator) -> Result<RecoveryCodes, CoordinationError> {
    let unused_codes = mfa::unused_codes(&authenticator)?;
    Ok(RecoveryCodes {
        total_code_count: *MFA_RECOVERY_CODE_COUNT,
        unused_code_count: unused_codes.len(),
        unused_codes,
        authenticator,
    })
}

/// The user's unused recovery codes.
pub async fn recovery_codes_core(session: &Session) -> Result<RecoveryCodes, CoordinationError> {
    let user = require_recent_user(session).await?;
    let authenticator = AuthenticatorStore::get_authenticator(&user.id, AuthenticatorType::RecoveryCodes)
        .await?
        .ok_or(MfaError::NotFound)?;
    recovery_codes_view(authenticator).await
}

/// Replace all recovery codes. Only allowed next to an active TOTP.
pub async fn regenerate_recovery_codes_core(
    session: &Session,
) -> Result<RecoveryCodes, CoordinationError> {
    let user = require_recent_user(session).await?;
    if !mfa::is_mfa_enabled(&user.id).await? {
        return Err(MfaError::NotFound.into());
    }
    let authenticator = mfa::regenerate_recovery_codes(&user.id).await?;
    account::send_notification_mail("mfa/email/recovery_codes_generated", &user).await?;
    recovery_codes_view(authenticator).await
}

/// Complete a login parked for its second factor.
pub async fn mfa_authenticate_core(
    session: &mut Session,
    code: &str,
) -> Result<SessionUser, CoordinationError> {
    let pending = mfa::pending_login(session)?.ok_or(MfaError::NoPendingLogin)?;
    let authenticator = mfa::verify_code(&pending.user_id, code).await?;

    let user = UserStore::get_user(&pending.user_id)
        .await?
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;

    mfa::clear_pending_login(session);
    account::login(session, &user, pending.method, pending.extra).await?;
    record_authentication(
        session,
        AuthenticationMethod::Mfa,
        authenticator.authentication_extra(false),
        false,
    );
    save_session(session).await?;

    tracing::info!(user_id = %user.id, "Second factor accepted");
    Ok(SessionUser::from(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::account::login_core;
    use crate::coordination::types::LoginOutcome;
    use crate::mfa::{PENDING_LOGIN_SESSION_KEY, format_hotp_value, hotp_counter_from_time, hotp_value};
    use crate::session::{create_session, login_session};
    use crate::test_utils::{init_test_environment, unique_name};
    use serde_json::Map;
    use serial_test::serial;

    fn current_code(secret: &str) -> String {
        format_hotp_value(hotp_value(secret, hotp_counter_from_time()).unwrap())
    }

    async fn password_user(username: &str) -> User {
        let mut user = User::new(Some(username.to_string()), None);
        user.password_hash = Some(account::hash_password("password-123").unwrap());
        UserStore::upsert_user(user).await.unwrap()
    }

    #[tokio::test]
    #[serial]
    async fn test_totp_enrolment_then_login_requires_code() {
        init_test_environment().await;
        let username = unique_name("mfa");
        let user = password_user(&username).await;

        let mut session = create_session().unwrap();
        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();

        let setup = totp_setup_core(&mut session).await.unwrap();
        assert!(setup.totp_url.starts_with("otpauth://totp/"));
        let activation = totp_activate_core(&mut session, &current_code(&setup.secret))
            .await
            .unwrap();
        assert_eq!(activation.recovery_codes.len(), *MFA_RECOVERY_CODE_COUNT);

        let codes = recovery_codes_core(&session).await.unwrap();
        assert_eq!(codes.unused_code_count, *MFA_RECOVERY_CODE_COUNT);

        // A fresh login now stops at the second factor
        let mut session = create_session().unwrap();
        let outcome = login_core(&mut session, &username, "password-123")
            .await
            .unwrap();
        assert!(matches!(outcome, LoginOutcome::MfaRequired));
        assert!(!session.is_authenticated());
        assert!(session.has_data(PENDING_LOGIN_SESSION_KEY));

        let err = mfa_authenticate_core(&mut session, "000000").await.unwrap_err();
        assert_eq!(err.code(), "incorrect_code");

        let recovery = activation.recovery_codes[0].clone();
        let logged_in = mfa_authenticate_core(&mut session, &recovery).await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(session.user_id(), Some(user.id.as_str()));
        let methods: Vec<_> = session
            .authentication_records()
            .iter()
            .map(|r| r.method)
            .collect();
        assert_eq!(
            methods,
            vec![AuthenticationMethod::Password, AuthenticationMethod::Mfa]
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_mfa_authenticate_without_pending_login() {
        init_test_environment().await;
        let mut session = create_session().unwrap();
        let err = mfa_authenticate_core(&mut session, "123456").await.unwrap_err();
        assert!(matches!(err, CoordinationError::Mfa(MfaError::NoPendingLogin)));
    }

    #[tokio::test]
    #[serial]
    async fn test_regenerate_requires_totp() {
        init_test_environment().await;
        let user = password_user(&unique_name("nototp")).await;
        let mut session = create_session().unwrap();
        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();
        assert!(matches!(
            regenerate_recovery_codes_core(&session).await,
            Err(CoordinationError::Mfa(MfaError::NotFound))
        ));
        assert!(list_authenticators_core(&session).await.unwrap().is_empty());
    }
}
