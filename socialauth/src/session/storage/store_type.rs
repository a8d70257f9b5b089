use chrono::{DateTime, Utc};

use crate::session::errors::SessionError;
use crate::session::types::UserSession;
use crate::storage::GENERIC_DATA_STORE;

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct UserSessionStore;

impl UserSessionStore {
    pub(crate) async fn init() -> Result<(), SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => {
                create_tables_sqlite(pool).await?;
                validate_user_session_tables_sqlite(pool).await
            }
            (_, Some(pool)) => {
                create_tables_postgres(pool).await?;
                validate_user_session_tables_postgres(pool).await
            }
            _ => Err(SessionError::Storage("Unsupported database type".to_string())),
        }
    }

    #[tracing::instrument(skip(user_session), fields(user_id = %user_session.user_id))]
    pub(crate) async fn insert(user_session: &UserSession) -> Result<(), SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_user_session_sqlite(pool, user_session).await
        } else if let Some(pool) = store.as_postgres() {
            insert_user_session_postgres(pool, user_session).await
        } else {
            Err(SessionError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_by_session_key(
        session_key: &str,
    ) -> Result<Option<UserSession>, SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_by_session_key_sqlite(pool, session_key).await
        } else if let Some(pool) = store.as_postgres() {
            get_by_session_key_postgres(pool, session_key).await
        } else {
            Err(SessionError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Oldest first
    pub(crate) async fn get_user_sessions(user_id: &str) -> Result<Vec<UserSession>, SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_user_sessions_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_user_sessions_postgres(pool, user_id).await
        } else {
            Err(SessionError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn record_activity(
        session_key: &str,
        last_seen_at: DateTime<Utc>,
        ip: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            record_activity_sqlite(pool, session_key, last_seen_at, ip, user_agent).await
        } else if let Some(pool) = store.as_postgres() {
            record_activity_postgres(pool, session_key, last_seen_at, ip, user_agent).await
        } else {
            Err(SessionError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn delete_by_session_key(session_key: &str) -> Result<(), SessionError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_by_session_key_sqlite(pool, session_key).await
        } else if let Some(pool) = store.as_postgres() {
            delete_by_session_key_postgres(pool, session_key).await
        } else {
            Err(SessionError::Storage("Unsupported database type".to_string()))
        }
    }
}
