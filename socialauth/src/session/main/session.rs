use chrono::{Duration, Utc};
use http::header::{COOKIE, HeaderMap};
use serde_json::{Map, Value};

use crate::session::config::{
    SESSION_CACHE_PREFIX, SESSION_COOKIE_MAX_AGE, SESSION_COOKIE_NAME, SESSION_TOKEN_HEADER,
};
use crate::session::errors::SessionError;
use crate::session::storage::UserSessionStore;
use crate::session::types::{
    AuthenticationMethod, AuthenticationRecord, ClientInfo, Session, SessionUser, StoredSession,
};
use crate::storage::{get_data, remove_data, store_cache_keyed};
use crate::userdb::UserStore;
use crate::utils::{gen_random_string, header_set_cookie};

use super::user_sessions::start_user_session;

/// Build a fresh anonymous session. Nothing is persisted until it is saved.
pub(crate) fn create_session() -> Result<Session, SessionError> {
    Ok(Session {
        id: gen_random_string(32)?,
        stored: StoredSession {
            user_id: None,
            csrf_token: gen_random_string(32)?,
            authentication_records: Vec::new(),
            data: Map::new(),
            expires_at: Utc::now() + Duration::seconds(*SESSION_COOKIE_MAX_AGE as i64),
        },
        client: ClientInfo::default(),
    })
}

/// Load a session by id. Unknown or expired sessions yield `None`.
pub async fn load_session(session_id: &str) -> Result<Option<Session>, SessionError> {
    let stored: Option<StoredSession> =
        get_data::<StoredSession, SessionError>(SESSION_CACHE_PREFIX, session_id).await?;

    let Some(stored) = stored else {
        return Ok(None);
    };

    if stored.expires_at < Utc::now() {
        tracing::debug!("Session expired at {}", stored.expires_at);
        remove_data::<SessionError>(SESSION_CACHE_PREFIX, session_id).await?;
        return Ok(None);
    }

    Ok(Some(Session {
        id: session_id.to_string(),
        stored,
        client: ClientInfo::default(),
    }))
}

/// Load the session named by `session_id`, or start a new anonymous one.
pub async fn load_or_create_session(session_id: Option<&str>) -> Result<Session, SessionError> {
    if let Some(session_id) = session_id {
        if let Some(session) = load_session(session_id).await? {
            return Ok(session);
        }
    }
    create_session()
}

pub async fn save_session(session: &Session) -> Result<(), SessionError> {
    let remaining = (session.stored.expires_at - Utc::now()).num_seconds();
    if remaining <= 0 {
        return Err(SessionError::SessionError);
    }

    store_cache_keyed::<_, SessionError>(
        SESSION_CACHE_PREFIX,
        &session.id,
        &session.stored,
        remaining as u64,
    )
    .await
}

/// Delete the session and the user session entry listing it.
pub async fn delete_session(session_id: &str) -> Result<(), SessionError> {
    remove_data::<SessionError>(SESSION_CACHE_PREFIX, session_id).await?;
    UserSessionStore::delete_by_session_key(session_id).await
}

/// Rotate the session id and CSRF token, keeping the session contents.
///
/// The old id is removed from the store so it can no longer be used.
pub(crate) async fn renew_session(session: &mut Session) -> Result<(), SessionError> {
    delete_session(&session.id).await?;
    session.id = gen_random_string(32)?;
    session.stored.csrf_token = gen_random_string(32)?;
    session.stored.expires_at = Utc::now() + Duration::seconds(*SESSION_COOKIE_MAX_AGE as i64);
    tracing::debug!("Session renewed");
    Ok(())
}

/// Bind `user_id` to the session after a successful login.
///
/// Logging in as a different user discards everything the previous
/// session held.
pub(crate) async fn login_session(
    session: &mut Session,
    user_id: &str,
    method: AuthenticationMethod,
    extra: Map<String, Value>,
) -> Result<(), SessionError> {
    if session.stored.user_id.as_deref() != Some(user_id) {
        session.stored.data.clear();
        session.stored.authentication_records.clear();
    }
    renew_session(session).await?;
    session.stored.user_id = Some(user_id.to_string());
    record_authentication(session, method, extra, false);
    save_session(session).await?;
    start_user_session(session).await?;
    tracing::info!(user_id = %user_id, method = ?method, "User logged in");
    Ok(())
}

/// Drop the user from the session and delete it from the store.
pub(crate) async fn logout_session(session: &mut Session) -> Result<(), SessionError> {
    delete_session(&session.id).await?;
    if let Some(user_id) = session.stored.user_id.take() {
        tracing::info!(user_id = %user_id, "User logged out");
    }
    session.stored.authentication_records.clear();
    session.stored.data.clear();
    Ok(())
}

pub(crate) fn record_authentication(
    session: &mut Session,
    method: AuthenticationMethod,
    extra: Map<String, Value>,
    reauthenticated: bool,
) {
    session
        .stored
        .authentication_records
        .push(AuthenticationRecord {
            method,
            at: Utc::now(),
            reauthenticated,
            extra,
        });
}

/// Retrieves the user bound to the session
pub async fn get_user_from_session(session_id: &str) -> Result<SessionUser, SessionError> {
    let session = load_session(session_id)
        .await?
        .ok_or(SessionError::SessionError)?;

    let user_id = session.user_id().ok_or(SessionError::SessionError)?;

    let user = UserStore::get_user(user_id)
        .await?
        .ok_or(SessionError::SessionError)?;

    Ok(SessionUser::from(user))
}

/// Session id from the `X-Session-Token` header, else from the session cookie.
pub fn get_session_id_from_headers(headers: &HeaderMap) -> Result<Option<&str>, SessionError> {
    if let Some(token) = headers.get(SESSION_TOKEN_HEADER) {
        let token = token.to_str().map_err(|e| {
            tracing::error!("Invalid session token header: {}", e);
            SessionError::HeaderError("Invalid session token header".to_string())
        })?;
        return Ok(Some(token));
    }

    let Some(cookie_header) = headers.get(COOKIE) else {
        tracing::debug!("No cookie header found");
        return Ok(None);
    };

    let cookie_str = cookie_header.to_str().map_err(|e| {
        tracing::error!("Invalid cookie header: {}", e);
        SessionError::HeaderError("Invalid cookie header".to_string())
    })?;

    let cookie_name = SESSION_COOKIE_NAME.as_str();

    Ok(cookie_str.split(';').map(|s| s.trim()).find_map(|s| {
        let mut parts = s.splitn(2, '=');
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if k == cookie_name => Some(v),
            _ => None,
        }
    }))
}

/// Set-Cookie header carrying the session id.
pub fn session_cookie_header(session: &Session) -> Result<HeaderMap, SessionError> {
    let mut headers = HeaderMap::new();
    header_set_cookie(
        &mut headers,
        SESSION_COOKIE_NAME.as_str(),
        &session.id,
        *SESSION_COOKIE_MAX_AGE as i64,
    )?;
    Ok(headers)
}

/// Delete the session and return headers expiring the session cookie.
pub async fn prepare_logout_response(session_id: Option<&str>) -> Result<HeaderMap, SessionError> {
    let mut headers = HeaderMap::new();
    header_set_cookie(&mut headers, SESSION_COOKIE_NAME.as_str(), "value", -86400)?;
    if let Some(session_id) = session_id {
        delete_session(session_id).await?;
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;
    use crate::userdb::User;
    use http::HeaderValue;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_save_and_load_session() {
        init_test_environment().await;

        let mut session = create_session().unwrap();
        session.set_data("key", &"value").unwrap();
        save_session(&session).await.unwrap();

        let loaded = load_session(session.id()).await.unwrap().unwrap();
        assert_eq!(loaded.csrf_token(), session.csrf_token());
        assert_eq!(loaded.get_data::<String>("key").unwrap().as_deref(), Some("value"));
        assert!(!loaded.is_authenticated());
    }

    #[tokio::test]
    #[serial]
    async fn test_expired_session_is_absent() {
        init_test_environment().await;

        let mut session = create_session().unwrap();
        save_session(&session).await.unwrap();

        session.stored.expires_at = Utc::now() - Duration::seconds(1);
        // Overwrite the stored copy with an already expired timestamp
        store_cache_keyed::<_, SessionError>(SESSION_CACHE_PREFIX, &session.id, &session.stored, 60)
            .await
            .unwrap();

        assert!(load_session(session.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_login_session_renews_id_and_records_authentication() {
        init_test_environment().await;

        let user = UserStore::upsert_user(User::new(None, None)).await.unwrap();

        let mut session = create_session().unwrap();
        session.set_data("pending", &1u8).unwrap();
        save_session(&session).await.unwrap();
        let old_id = session.id().to_string();
        let old_csrf = session.csrf_token().to_string();

        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();

        assert_ne!(session.id(), old_id);
        assert_ne!(session.csrf_token(), old_csrf);
        assert_eq!(session.user_id(), Some(user.id.as_str()));
        assert_eq!(session.authentication_records().len(), 1);
        assert!(!session.has_data("pending"));
        assert!(load_session(&old_id).await.unwrap().is_none());

        let session_user = get_user_from_session(session.id()).await.unwrap();
        assert_eq!(session_user.id, user.id);
    }

    #[tokio::test]
    #[serial]
    async fn test_logout_session() {
        init_test_environment().await;

        let user = UserStore::upsert_user(User::new(None, None)).await.unwrap();
        let mut session = create_session().unwrap();
        login_session(&mut session, &user.id, AuthenticationMethod::Password, Map::new())
            .await
            .unwrap();
        let id = session.id().to_string();

        logout_session(&mut session).await.unwrap();

        assert!(!session.is_authenticated());
        assert!(load_session(&id).await.unwrap().is_none());
        assert!(get_user_from_session(&id).await.is_err());
    }

    #[test]
    fn test_get_session_id_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(get_session_id_from_headers(&headers).unwrap(), None);

        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("other=1; {}=abc123", SESSION_COOKIE_NAME.as_str()))
                .unwrap(),
        );
        assert_eq!(get_session_id_from_headers(&headers).unwrap(), Some("abc123"));

        headers.insert(SESSION_TOKEN_HEADER, HeaderValue::from_static("apptoken"));
        assert_eq!(get_session_id_from_headers(&headers).unwrap(), Some("apptoken"));
    }

    #[tokio::test]
    async fn test_prepare_logout_response_expires_cookie() {
        let headers = prepare_logout_response(None).await.unwrap();
        let cookie = headers
            .get(http::header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("Max-Age=-86400"));
    }
}
