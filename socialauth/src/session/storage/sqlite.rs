use chrono::{DateTime, Utc};
use sqlx::{Pool, Sqlite};

use crate::session::errors::SessionError;
use crate::session::types::UserSession;
use crate::storage::validate_sqlite_table_schema;

use super::config::DB_TABLE_USER_SESSIONS;

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            session_key TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            last_seen_at TIMESTAMP NOT NULL,
            ip TEXT,
            user_agent TEXT
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table_name}_user_id ON {table_name}(user_id)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_user_session_tables_sqlite(
    pool: &Pool<Sqlite>,
) -> Result<(), SessionError> {
    let expected_columns = [
        ("id", "TEXT"),
        ("session_key", "TEXT"),
        ("user_id", "TEXT"),
        ("created_at", "TIMESTAMP"),
        ("last_seen_at", "TIMESTAMP"),
        ("ip", "TEXT"),
        ("user_agent", "TEXT"),
    ];

    validate_sqlite_table_schema(
        pool,
        DB_TABLE_USER_SESSIONS.as_str(),
        &expected_columns,
        SessionError::Storage,
    )
    .await
}

pub(super) async fn insert_user_session_sqlite(
    pool: &Pool<Sqlite>,
    user_session: &UserSession,
) -> Result<(), SessionError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, session_key, user_id, created_at, last_seen_at, ip, user_agent)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (session_key) DO UPDATE SET
            user_id = excluded.user_id,
            last_seen_at = excluded.last_seen_at,
            ip = excluded.ip,
            user_agent = excluded.user_agent
        "#
    ))
    .bind(&user_session.id)
    .bind(&user_session.session_key)
    .bind(&user_session.user_id)
    .bind(user_session.created_at)
    .bind(user_session.last_seen_at)
    .bind(&user_session.ip)
    .bind(&user_session.user_agent)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn get_by_session_key_sqlite(
    pool: &Pool<Sqlite>,
    session_key: &str,
) -> Result<Option<UserSession>, SessionError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, UserSession>(&format!(
        "SELECT * FROM {table_name} WHERE session_key = ?"
    ))
    .bind(session_key)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn get_user_sessions_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<UserSession>, SessionError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, UserSession>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn record_activity_sqlite(
    pool: &Pool<Sqlite>,
    session_key: &str,
    last_seen_at: DateTime<Utc>,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), SessionError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name}
        SET last_seen_at = ?, ip = COALESCE(?, ip), user_agent = COALESCE(?, user_agent)
        WHERE session_key = ?
        "#
    ))
    .bind(last_seen_at)
    .bind(ip)
    .bind(user_agent)
    .bind(session_key)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_by_session_key_sqlite(
    pool: &Pool<Sqlite>,
    session_key: &str,
) -> Result<(), SessionError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE session_key = ?"))
        .bind(session_key)
        .execute(pool)
        .await?;

    Ok(())
}
