use sqlx::{Pool, Sqlite};

use crate::account::{errors::AccountError, types::EmailAddress};
use crate::storage::validate_sqlite_table_schema;

use super::config::DB_TABLE_EMAIL_ADDRESSES;

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), AccountError> {
    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            email TEXT NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT false,
            is_primary BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMP NOT NULL,
            UNIQUE (user_id, email)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table_name}_email ON {table_name}(email)"
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_email_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), AccountError> {
    let expected_columns = [
        ("id", "TEXT"),
        ("user_id", "TEXT"),
        ("email", "TEXT"),
        ("verified", "BOOLEAN"),
        ("is_primary", "BOOLEAN"),
        ("created_at", "TIMESTAMP"),
    ];

    validate_sqlite_table_schema(
        pool,
        DB_TABLE_EMAIL_ADDRESSES.as_str(),
        &expected_columns,
        AccountError::Storage,
    )
    .await
}

pub(super) async fn upsert_email_sqlite(
    pool: &Pool<Sqlite>,
    address: &EmailAddress,
) -> Result<EmailAddress, AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();
    let mut tx = pool.begin().await?;

    if address.primary {
        sqlx::query(&format!(
            "UPDATE {table_name} SET is_primary = false WHERE user_id = ? AND email <> ?"
        ))
        .bind(&address.user_id)
        .bind(&address.email)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, email, verified, is_primary, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, email) DO UPDATE SET
            verified = excluded.verified,
            is_primary = excluded.is_primary
        "#
    ))
    .bind(&address.id)
    .bind(&address.user_id)
    .bind(&address.email)
    .bind(address.verified)
    .bind(address.primary)
    .bind(address.created_at)
    .execute(&mut *tx)
    .await?;

    let saved = sqlx::query_as::<_, EmailAddress>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? AND email = ?"
    ))
    .bind(&address.user_id)
    .bind(&address.email)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(saved)
}

pub(super) async fn get_emails_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<EmailAddress>, AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    Ok(sqlx::query_as::<_, EmailAddress>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? ORDER BY is_primary DESC, email ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn find_by_email_sqlite(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Vec<EmailAddress>, AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    Ok(sqlx::query_as::<_, EmailAddress>(&format!(
        "SELECT * FROM {table_name} WHERE lower(email) = lower(?) ORDER BY verified DESC, is_primary DESC, created_at ASC"
    ))
    .bind(email)
    .fetch_all(pool)
    .await?)
}

pub(super) async fn set_primary_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    email: &str,
) -> Result<bool, AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "UPDATE {table_name} SET is_primary = false WHERE user_id = ?"
    ))
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let updated = sqlx::query(&format!(
        "UPDATE {table_name} SET is_primary = true WHERE user_id = ? AND email = ?"
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

pub(super) async fn mark_verified_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    email: &str,
) -> Result<bool, AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    let result = sqlx::query(&format!(
        "UPDATE {table_name} SET verified = true WHERE user_id = ? AND email = ?"
    ))
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete_email_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
    email: &str,
) -> Result<(), AccountError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_EMAIL_ADDRESSES.as_str();

    sqlx::query(&format!(
        "DELETE FROM {table_name} WHERE user_id = ? AND email = ?"
    ))
    .bind(user_id)
    .bind(email)
    .execute(pool)
    .await?;

    Ok(())
}
