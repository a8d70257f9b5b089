use chrono::{Duration, Utc};
use serde_json::Map;

use crate::account::verify_password;
use crate::config::SA_ROUTE_PREFIX;
use crate::mfa::{is_mfa_enabled, verify_code};
use crate::reauth::config::ACCOUNT_REAUTHENTICATION_TIMEOUT;
use crate::reauth::errors::ReauthError;
use crate::reauth::types::{ReauthStash, ResumeAction, ResumeState, StashKind, StashedRequest};
use crate::session::{AuthenticationMethod, Session, record_authentication, save_session};
use crate::userdb::{User, UserStore};

const STASH_SESSION_KEY: &str = "account_reauthentication_state";

fn reauthenticate_url() -> String {
    format!("{}/reauthenticate/", SA_ROUTE_PREFIX.as_str())
}

async fn session_user(session: &Session) -> Result<User, ReauthError> {
    let user_id = session.user_id().ok_or(ReauthError::NotAuthenticated)?;
    UserStore::get_user(user_id)
        .await?
        .ok_or(ReauthError::NotAuthenticated)
}

/// Whether the session proved its identity recently enough for a sensitive action.
///
/// Users without any way to reauthenticate (no usable password and no TOTP)
/// always pass.
pub async fn did_recently_authenticate(session: &Session) -> Result<bool, ReauthError> {
    let Ok(user) = session_user(session).await else {
        return Ok(false);
    };

    if !user.has_usable_password() && !is_mfa_enabled(&user.id).await? {
        return Ok(true);
    }

    let Some(last) = session.authentication_records().last() else {
        return Ok(false);
    };
    Ok(last.at + Duration::seconds(*ACCOUNT_REAUTHENTICATION_TIMEOUT) > Utc::now())
}

pub async fn raise_if_reauthentication_required(session: &Session) -> Result<(), ReauthError> {
    if did_recently_authenticate(session).await? {
        Ok(())
    } else {
        Err(ReauthError::Required)
    }
}

async fn put_stash(session: &mut Session, kind: StashKind) -> Result<(), ReauthError> {
    let stash = ReauthStash {
        kind,
        released: false,
    };
    session.set_data(STASH_SESSION_KEY, &stash)?;
    save_session(session).await?;
    Ok(())
}

/// Park `request` in the session and return where to reauthenticate.
/// The returned URL carries the request path as `next`.
pub async fn suspend_request(
    session: &mut Session,
    request: StashedRequest,
) -> Result<String, ReauthError> {
    let next = urlencoding::encode(&request.path).into_owned();
    tracing::debug!(method = %request.method, path = %request.path, "Suspending request for reauthentication");
    put_stash(session, StashKind::Request(request)).await?;
    Ok(format!("{}?next={next}", reauthenticate_url()))
}

/// Park an in-process continuation and return where to reauthenticate.
pub async fn stash_and_reauthenticate(
    session: &mut Session,
    state: ResumeState,
) -> Result<String, ReauthError> {
    put_stash(session, StashKind::Continue(state)).await?;
    Ok(reauthenticate_url())
}

/// Record a fresh authentication and release whatever waits for it.
async fn complete_reauthentication(
    session: &mut Session,
    method: AuthenticationMethod,
    extra: Map<String, serde_json::Value>,
) -> Result<(), ReauthError> {
    record_authentication(session, method, extra, true);
    if let Some(mut stash) = session.get_data::<ReauthStash>(STASH_SESSION_KEY)? {
        stash.released = true;
        session.set_data(STASH_SESSION_KEY, &stash)?;
    }
    save_session(session).await?;
    tracing::info!(user_id = ?session.user_id(), method = ?method, "User reauthenticated");
    Ok(())
}

pub async fn reauthenticate_with_password(
    session: &mut Session,
    password: &str,
) -> Result<(), ReauthError> {
    let user = session_user(session).await?;
    let accepted = match user.password_hash.as_deref() {
        Some(hash) if user.has_usable_password() => verify_password(password, hash),
        _ => false,
    };
    if !accepted {
        tracing::warn!(user_id = %user.id, "Reauthentication with incorrect password");
        return Err(ReauthError::IncorrectPassword);
    }
    complete_reauthentication(session, AuthenticationMethod::Password, Map::new()).await
}

/// Reauthenticate with a TOTP or recovery code.
pub async fn reauthenticate_with_totp(session: &mut Session, code: &str) -> Result<(), ReauthError> {
    let user = session_user(session).await?;
    let authenticator = verify_code(&user.id, code).await?;
    complete_reauthentication(
        session,
        AuthenticationMethod::Mfa,
        authenticator.authentication_extra(true),
    )
    .await
}

/// Decide how to continue once reauthentication succeeded.
///
/// A continuation is handed back and consumed. A stashed request is only
/// replayed when `next` points at its path; it stays in the session, released,
/// until the follow-up request to that path picks it up. Anything else drops
/// the stash.
pub async fn resume_request(
    session: &mut Session,
    next: Option<&str>,
) -> Result<ResumeAction, ReauthError> {
    let Some(stash) = session.get_data::<ReauthStash>(STASH_SESSION_KEY)? else {
        return Ok(next.map_or(ResumeAction::None, |n| ResumeAction::Redirect(n.to_string())));
    };

    if !stash.released {
        return Err(ReauthError::Required);
    }

    let action = match stash.kind {
        StashKind::Request(request) if next == Some(request.path.as_str()) => {
            return Ok(ResumeAction::Replay(request));
        }
        StashKind::Continue(state) => ResumeAction::Continue(state),
        StashKind::Request(_) => {
            tracing::debug!("Dropping stashed request for a different path");
            next.map_or(ResumeAction::None, |n| ResumeAction::Redirect(n.to_string()))
        }
    };
    session.remove_data(STASH_SESSION_KEY);
    save_session(session).await?;
    Ok(action)
}

/// Take the released request stashed for `path`, consuming it.
pub async fn take_released_request(
    session: &mut Session,
    path: &str,
) -> Result<Option<StashedRequest>, ReauthError> {
    let Some(stash) = session.get_data::<ReauthStash>(STASH_SESSION_KEY)? else {
        return Ok(None);
    };
    match stash.kind {
        StashKind::Request(request) if stash.released && request.path == path => {
            session.remove_data(STASH_SESSION_KEY);
            save_session(session).await?;
            tracing::debug!(method = %request.method, path = %request.path, "Replaying stashed request");
            Ok(Some(request))
        }
        _ => Ok(None),
    }
}

/// Whether something waits for reauthentication in this session.
pub fn has_pending_reauthentication(session: &Session) -> bool {
    session.has_data(STASH_SESSION_KEY)
}
