use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::session::errors::SessionError;
use crate::session::types::UserSession;
use crate::storage::validate_postgres_table_schema;

use super::config::DB_TABLE_USER_SESSIONS;

pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            session_key TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            last_seen_at TIMESTAMPTZ NOT NULL,
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

pub(super) async fn validate_user_session_tables_postgres(
    pool: &Pool<Postgres>,
) -> Result<(), SessionError> {
    let expected_columns = [
        ("id", "text"),
        ("session_key", "text"),
        ("user_id", "text"),
        ("created_at", "timestamp with time zone"),
        ("last_seen_at", "timestamp with time zone"),
        ("ip", "text"),
        ("user_agent", "text"),
    ];

    validate_postgres_table_schema(
        pool,
        DB_TABLE_USER_SESSIONS.as_str(),
        &expected_columns,
        SessionError::Storage,
    )
    .await
}

pub(super) async fn insert_user_session_postgres(
    pool: &Pool<Postgres>,
    user_session: &UserSession,
) -> Result<(), SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, session_key, user_id, created_at, last_seen_at, ip, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (session_key) DO UPDATE SET
            user_id = EXCLUDED.user_id,
            last_seen_at = EXCLUDED.last_seen_at,
            ip = EXCLUDED.ip,
            user_agent = EXCLUDED.user_agent
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

pub(super) async fn get_by_session_key_postgres(
    pool: &Pool<Postgres>,
    session_key: &str,
) -> Result<Option<UserSession>, SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, UserSession>(&format!(
        "SELECT * FROM {table_name} WHERE session_key = $1"
    ))
    .bind(session_key)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn get_user_sessions_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<UserSession>, SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    Ok(sqlx::query_as::<_, UserSession>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = $1 ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn record_activity_postgres(
    pool: &Pool<Postgres>,
    session_key: &str,
    last_seen_at: DateTime<Utc>,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!(
        r#"
        UPDATE {table_name}
        SET last_seen_at = $1, ip = COALESCE($2, ip), user_agent = COALESCE($3, user_agent)
        WHERE session_key = $4
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

pub(super) async fn delete_by_session_key_postgres(
    pool: &Pool<Postgres>,
    session_key: &str,
) -> Result<(), SessionError> {
    let table_name = DB_TABLE_USER_SESSIONS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE session_key = $1"))
        .bind(session_key)
        .execute(pool)
        .await?;

    Ok(())
}
