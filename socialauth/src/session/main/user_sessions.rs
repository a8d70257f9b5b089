use chrono::Utc;

use crate::session::config::USERSESSIONS_TRACK_ACTIVITY;
use crate::session::errors::SessionError;
use crate::session::storage::UserSessionStore;
use crate::session::types::{Session, UserSession};
use crate::utils::gen_random_string;

use super::session::{delete_session, load_session};

const USER_AGENT_MAX_LENGTH: usize = 200;

fn clip_user_agent(user_agent: Option<&str>) -> Option<String> {
    user_agent.map(|ua| ua.chars().take(USER_AGENT_MAX_LENGTH).collect())
}

/// Record a freshly logged-in session under its user.
pub(crate) async fn start_user_session(session: &Session) -> Result<(), SessionError> {
    let Some(user_id) = session.user_id() else {
        return Ok(());
    };
    let now = Utc::now();
    let user_session = UserSession {
        id: gen_random_string(16)?,
        session_key: session.id().to_string(),
        user_id: user_id.to_string(),
        created_at: now,
        last_seen_at: now,
        ip: session.client.ip.clone(),
        user_agent: clip_user_agent(session.client.user_agent.as_deref()),
        is_current: false,
    };
    UserSessionStore::insert(&user_session).await
}

/// Note a request made with an authenticated session.
///
/// A session that logged in before entries were kept gets one now. Later
/// requests refresh the entry only when activity tracking is on.
pub async fn touch_user_session(session: &Session) -> Result<(), SessionError> {
    if !session.is_authenticated() {
        return Ok(());
    }
    match UserSessionStore::get_by_session_key(session.id()).await? {
        None => start_user_session(session).await,
        Some(_) if *USERSESSIONS_TRACK_ACTIVITY => {
            UserSessionStore::record_activity(
                session.id(),
                Utc::now(),
                session.client.ip.as_deref(),
                clip_user_agent(session.client.user_agent.as_deref()).as_deref(),
            )
            .await
        }
        Some(_) => Ok(()),
    }
}

/// Sessions of `user_id` that are still logged in as that user, oldest
/// first. Entries whose session expired or changed hands are dropped.
pub(crate) async fn list_user_sessions(
    user_id: &str,
    current_session_id: &str,
) -> Result<Vec<UserSession>, SessionError> {
    let mut live = Vec::new();
    for mut entry in UserSessionStore::get_user_sessions(user_id).await? {
        let alive = load_session(&entry.session_key)
            .await?
            .is_some_and(|s| s.user_id() == Some(user_id));
        if !alive {
            tracing::debug!(user_id = %user_id, "Purging stale user session entry");
            UserSessionStore::delete_by_session_key(&entry.session_key).await?;
            continue;
        }
        entry.is_current = entry.session_key == current_session_id;
        live.push(entry);
    }
    Ok(live)
}

/// End the sessions of `user_id` whose entry ids are in `ids`.
///
/// Returns the session keys that were ended. Ids belonging to other users
/// are ignored.
pub(crate) async fn end_user_sessions(
    user_id: &str,
    ids: &[String],
) -> Result<Vec<String>, SessionError> {
    let mut ended = Vec::new();
    for entry in UserSessionStore::get_user_sessions(user_id).await? {
        if !ids.contains(&entry.id) {
            continue;
        }
        delete_session(&entry.session_key).await?;
        ended.push(entry.session_key);
    }
    tracing::info!(user_id = %user_id, count = ended.len(), "Ended user sessions");
    Ok(ended)
}
