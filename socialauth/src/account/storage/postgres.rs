use sqlx::{Pool, Postgres};

use crate::account::{errors::AccountError, types::EmailAddress};
use crate::storage::validate_postgres_table_schema;

use super::config::DB_TABLE_EMAIL_ADDRESSES;

pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            email TEXT NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT FALSE,
            is_primary BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (user_id, email)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table_name}_email ON {table_name}(lower(email))"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_email_tables_postgres(
    pool: &Pool<Postgres>,
) -> Result<(), AccountError> {
    let expected_columns = [
        ("id", "text"),
        ("user_id", "text"),
        ("email", "text"),
        ("verified", "boolean"),
        ("is_primary", "boolean"),
        ("created_at", "timestamp with time zone"),
    ];

    validate_postgres_table_schema(
        pool,
        DB_TABLE_EMAIL_ADDRESSES.as_str(),
        &expected_columns,
        AccountError::Storage,
    )
    .await
}

pub(super) async fn upsert_email_postgres(
    pool: &Pool<Postgres>,
    address: &EmailAddress,
) -> Result<EmailAddress, AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();
    let mut tx = pool.begin().await?;

    if address.primary {
        sqlx::query(&format!(
            "UPDATE {table_name} SET is_primary = FALSE WHERE user_id = $1 AND email <> $2"
        ))
        .bind(&address.user_id)
        .bind(&address.email)
        .execute(&mut *tx)
        .await?;
    }

    let saved = sqlx::query_as::<_, EmailAddress>(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, email, verified, is_primary, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id, email) DO UPDATE SET
            verified = EXCLUDED.verified,
            is_primary = EXCLUDED.is_primary
        RETURNING *
        "#
    ))
    .bind(&address.id)
    .bind(&address.user_id)
    .bind(&address.email)
    .bind(address.verified)
    .bind(address.primary)
    .bind(address.created_at)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(saved)
}

pub(super) async fn get_emails_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
) -> Result<Vec<EmailAddress>, AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    Ok(sqlx::query_as::<_, EmailAddress>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = $1 ORDER BY is_primary DESC, email ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn find_by_email_postgres(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Vec<EmailAddress>, AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    Ok(sqlx::query_as::<_, EmailAddress>(&format!(
        "SELECT * FROM {table_name} WHERE lower(email) = lower($1) ORDER BY verified DESC, is_primary DESC, created_at ASC"
    ))
    .bind(email)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn set_primary_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    email: &str,
) -> Result<bool, AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "UPDATE {table_name} SET is_primary = FALSE WHERE user_id = $1"
    ))
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query(&format!(
        "UPDATE {table_name} SET is_primary = TRUE WHERE user_id = $1 AND email = $2"
    ))
    .bind(user_id)
    .bind(email)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    tx.commit().await?;
    Ok(true)
}

pub(super) async fn mark_verified_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    email: &str,
) -> Result<bool, AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    let result = sqlx::query(&format!(
        "UPDATE {table_name} SET verified = TRUE WHERE user_id = $1 AND email = $2"
    ))
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete_email_postgres(
    pool: &Pool<Postgres>,
    user_id: &str,
    email: &str,
) -> Result<(), AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    sqlx::query(&format!(
        "DELETE FROM {table_name} WHERE user_id = $1 AND email = $2"
    ))
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(())
}
