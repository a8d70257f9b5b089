use chrono::{Duration, Utc};
use serde_json::{Map, Value};

use crate::session::{AuthenticationMethod, Session, save_session};

use super::config::MFA_LOGIN_TIMEOUT;
use super::errors::MfaError;
use super::recovery_codes::validate_recovery_code;
use super::storage::AuthenticatorStore;
use super::totp::validate_user_totp;
use super::types::{Authenticator, AuthenticatorType, PendingMfaLogin};

pub(crate) const PENDING_LOGIN_SESSION_KEY: &str = "mfa.pending_login";

/// True when the user has a second factor that gates login.
pub(crate) async fn is_mfa_enabled(user_id: &str) -> Result<bool, MfaError> {
    Ok(AuthenticatorStore::get_authenticators(user_id)
        .await?
        .iter()
        .any(|a| a.kind == AuthenticatorType::Totp))
}

/// Park a first-factor login in the session until the second factor arrives.
pub(crate) async fn stage_login(
    session: &mut Session,
    user_id: &str,
    method: AuthenticationMethod,
    extra: Map<String, Value>,
) -> Result<(), MfaError> {
    let pending = PendingMfaLogin {
        user_id: user_id.to_string(),
        method,
        extra,
        at: Utc::now(),
    };
    session.set_data(PENDING_LOGIN_SESSION_KEY, &pending)?;
    save_session(session).await?;
    tracing::debug!(user_id = %user_id, "Login waiting for second factor");
    Ok(())
}

/// The parked login, if present and not timed out.
pub(crate) fn pending_login(session: &Session) -> Result<Option<PendingMfaLogin>, MfaError> {
    let Some(pending) = session.get_data::<PendingMfaLogin>(PENDING_LOGIN_SESSION_KEY)? else {
        return Ok(None);
    };
    if pending.at + Duration::seconds(*MFA_LOGIN_TIMEOUT) < Utc::now() {
        tracing::debug!(user_id = %pending.user_id, "Pending MFA login timed out");
        return Ok(None);
    }
    Ok(Some(pending))
}

pub(crate) fn clear_pending_login(session: &mut Session) {
    session.remove_data(PENDING_LOGIN_SESSION_KEY);
}

/// Check `code` against the user's TOTP, then against unused recovery codes.
/// Returns the authenticator that accepted it.
pub(crate) async fn verify_code(user_id: &str, code: &str) -> Result<Authenticator, MfaError> {
    let code = code.trim();
    let authenticators = AuthenticatorStore::get_authenticators(user_id).await?;

    for mut authenticator in authenticators {
        let accepted = match authenticator.kind {
            AuthenticatorType::Totp => validate_user_totp(&authenticator, code).await?,
            AuthenticatorType::RecoveryCodes => {
                validate_recovery_code(&mut authenticator, code).await?
            }
        };
        if accepted {
            AuthenticatorStore::record_usage(&authenticator.id).await?;
            return Ok(authenticator);
        }
    }

    tracing::warn!(user_id = %user_id, "Incorrect second factor code");
    Err(MfaError::IncorrectCode)
}
