use chrono::Utc;
use serde_json::Value;
use sqlx::{Pool, Postgres, types::Json};

use crate::mfa::errors::MfaError;
use crate::mfa::types::{Authenticator, AuthenticatorType};
use crate::storage::validate_postgres_table_schema;

use super::config::DB_TABLE_AUTHENTICATORS;

pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            authenticator_type TEXT NOT NULL,
            data JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            last_used_at TIMESTAMPTZ,
            UNIQUE (user_id, authenticator_type)
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_authenticator_tables_postgres(
    pool: &Pool<Postgres>,
) -> Result<(), MfaError> {
    let expected_columns = [
        ("id", "text"),
        ("user_id", "text"),
        ("authenticator_type", "text"),
        ("data", "jsonb"),
        ("created_at", "timestamp with time zone"),
        ("last_used_at", "timestamp with time zone"),
    ];

    validate_postgres_table_schema(
        pool,
        DB_TABLE_AUTHENTICATORS.as_str(),
        &expected_columns,
        MfaError::Storage,
    )
    .await
}

pub(super) async fn insert_authenticator_postgres(
    pool: &Pool<Postgres>,
    authenticator: &Authenticator,
) -> Result<(), MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, authenticator_type, data, created_at, last_used_at)
        VALUES ($1, $2, $3, $4, $5, $6)
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

pub(super) async fn get_authenticators_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<Authenticator>, MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    Ok(sqlx::query_as::<_, Authenticator>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = $1 ORDER BY created_at ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn get_authenticator_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    kind: AuthenticatorType,
) -> Result<Option<Authenticator>, MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    Ok(sqlx::query_as::<_, Authenticator>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = $1 AND authenticator_type = $2"
    ))
    .bind(user_id)
    .bind(kind.as_str())
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn update_data_postgres(
    pool: &Pool<Postgres>,
    id: &str,
    data: &Value,
) -> Result<bool, MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    let result = sqlx::query(&format!("UPDATE {table_name} SET data = $1 WHERE id = $2"))
        .bind(Json(data))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn record_usage_postgres(pool: &Pool<Postgres>, id: &str) -> Result<(), MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!(
        "UPDATE {table_name} SET last_used_at = $1 WHERE id = $2"
    ))
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn delete_authenticator_postgres(
    pool: &Pool<Postgres>,
    id: &str,
) -> Result<(), MfaError> {
    let table_name = DB_TABLE_AUTHENTICATORS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
