use chrono::Utc;
use serde_json::Value;
use sqlx::{Pool, Sqlite, types::Json};

use crate::mfa::errors::MfaError;
use crate::mfa::types::{Authenticator, AuthenticatorType};
use crate::storage::validate_sqlite_table_schema;

use super::config::DB_TABLE_AUTHENTICATORS;

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            authenticator_type TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL,
            last_used_at TIMESTAMP,
            UNIQUE (user_id, authenticator_type)
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_authenticator_tables_sqlite(
    pool: &Pool<Sqlite>,
) -> Result<(), MfaError> {
    let expected_columns = [
        ("id", "TEXT"),
        ("user_id", "TEXT"),
        ("authenticator_type", "TEXT"),
        ("data", "TEXT"),
        ("created_at", "TIMESTAMP"),
        ("last_used_at", "TIMESTAMP"),
    ];

    validate_sqlite_table_schema(
        pool,
        DB_TABLE_AUTHENTICATORS.as_str(),
        &expected_columns,
        MfaError::Storage,
    )
    .await
}

pub(super) async fn insert_authenticator_sqlite(
    pool: &Pool<Sqlite>,
    authenticator: &Authenticator,
) -> Result<(), MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, authenticator_type, data, created_at, last_used_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#
    ))
    .bind(&authenticator.id)
    .bind(&authenticator.user_id)
    .bind(authenticator.kind.as_str())
    .bind(Json(&authenticator.data))
    .bind(authenticator.created_at)
    .bind(authenticator.last_used_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn get_authenticators_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<Authenticator>, MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    Ok(sqlx::query_as::<_, Authenticator>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn get_authenticator_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    kind: AuthenticatorType,
) -> Result<Option<Authenticator>, MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    Ok(sqlx::query_as::<_, Authenticator>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? AND authenticator_type = ?"
    ))
    .bind(user_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn update_data_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
    data: &Value,
) -> Result<bool, MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    let result = sqlx::query(&format!("UPDATE {table_name} SET data = ? WHERE id = ?"))
        .bind(Json(data))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn record_usage_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        "UPDATE {table_name} SET last_used_at = ? WHERE id = ?"
    ))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_authenticator_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
) -> Result<(), MfaError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE id = ?"))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
