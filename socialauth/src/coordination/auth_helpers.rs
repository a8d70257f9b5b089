//! Authorization helpers shared by the coordination functions
//!
//! Session data is always checked against fresh database state before a
//! user is trusted.

use serde_json::{Map, Value};

use super::errors::CoordinationError;
use super::types::{LoginOutcome, PendingFlow};
use crate::account;
use crate::config::ORIGIN;
use crate::mfa;
use crate::reauth::{
    ACCOUNT_REAUTHENTICATION_REQUIRED, has_pending_reauthentication,
    raise_if_reauthentication_required,
};
use crate::session::{AuthenticationMethod, Session, SessionUser, save_session};
use crate::socialaccount;
use crate::userdb::{User, UserStore};

/// Session key holding the user whose login waits for email verification
pub(super) const UNVERIFIED_USER_SESSION_KEY: &str = "account_unverified_user_id";

/// The active user bound to the session.
pub(super) async fn require_user(session: &Session) -> Result<User, CoordinationError> {
    let user_id = session
        .user_id()
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;

    let user = UserStore::get_user(user_id)
        .await?
        .ok_or_else(|| CoordinationError::Unauthorized.log())?;

    if !user.is_active {
        tracing::warn!(user_id = %user.id, "Session bound to inactive user");
        return Err(CoordinationError::Unauthorized);
    }
    Ok(user)
}

pub(super) fn require_anonymous(session: &Session) -> Result<(), CoordinationError> {
    if session.is_authenticated() {
        return Err(CoordinationError::UnexpectedlyAuthorized);
    }
    Ok(())
}

/// Enforce the recent-authentication gate when it is enabled.
pub(super) async fn gate_sensitive_action(session: &Session) -> Result<(), CoordinationError> {
    if *ACCOUNT_REAUTHENTICATION_REQUIRED {
        raise_if_reauthentication_required(session).await?;
    }
    Ok(())
}

/// Bind `user` to the session once nothing else stands in the way.
///
/// Mandatory email verification blocks the login; an active second factor
/// parks it in the session.
pub(super) async fn perform_login(
    session: &mut Session,
    user: &User,
    method: AuthenticationMethod,
    extra: Map<String, Value>,
) -> Result<LoginOutcome, CoordinationError> {
    if let Some(email) = account::pending_email_verification(user).await? {
        session.set_data(UNVERIFIED_USER_SESSION_KEY, &user.id)?;
        save_session(session).await?;
        tracing::info!(user_id = %user.id, "Login waits for email verification");
        return Ok(LoginOutcome::VerificationRequired { email });
    }

    if mfa::is_mfa_enabled(&user.id).await? {
        mfa::stage_login(session, &user.id, method, extra).await?;
        return Ok(LoginOutcome::MfaRequired);
    }

    account::login(session, user, method, extra).await?;
    Ok(LoginOutcome::LoggedIn(SessionUser::from(user.clone())))
}

/// Accept only same-origin redirect targets.
pub(super) fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.starts_with("/\\") {
        return Some(next.to_string());
    }
    let rest = next.strip_prefix(ORIGIN.as_str())?;
    if rest.is_empty() || rest.starts_with('/') {
        return Some(next.to_string());
    }
    tracing::warn!("Ignoring off-site redirect target");
    None
}

/// Flows currently waiting in the session.
pub fn pending_flows(session: &Session) -> Vec<PendingFlow> {
    let mut flows = Vec::new();
    if session.is_authenticated() && has_pending_reauthentication(session) {
        flows.push(PendingFlow::Reauthenticate);
    }
    if matches!(mfa::pending_login(session), Ok(Some(_))) {
        flows.push(PendingFlow::MfaAuthenticate);
    }
    if matches!(socialaccount::pending_signup(session), Ok(Some(_))) {
        flows.push(PendingFlow::ProviderSignup);
    }
    if session.has_data(UNVERIFIED_USER_SESSION_KEY) {
        flows.push(PendingFlow::VerifyEmail);
    }
    if matches!(account::pending_login_code(session), Ok(Some(_))) {
        flows.push(PendingFlow::LoginByCode);
    }
    flows
}
