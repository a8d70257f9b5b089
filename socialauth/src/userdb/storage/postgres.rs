use sqlx::{Pool, Postgres};

use crate::storage::validate_postgres_table_schema;
use crate::userdb::{
    errors::UserError,
    types::{User, UserSearchField},
};

use super::config::DB_TABLE_USERS;

pub(super) async fn create_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let table_name = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            sequence_number BIGSERIAL PRIMARY KEY,
            id TEXT NOT NULL UNIQUE,
            username TEXT,
            email TEXT,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            password_hash TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_{table_name}_username_lower
        ON {table_name} (lower(username))
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_user_tables_postgres(pool: &Pool<Postgres>) -> Result<(), UserError> {
    let expected_columns = [
        ("sequence_number", "bigint"),
        ("id", "text"),
        ("username", "text"),
        ("email", "text"),
        ("first_name", "text"),
        ("last_name", "text"),
        ("password_hash", "text"),
        ("is_active", "boolean"),
        ("created_at", "timestamp with time zone"),
        ("updated_at", "timestamp with time zone"),
    ];

    validate_postgres_table_schema(
        pool,
        DB_TABLE_USERS.as_str(),
        &expected_columns,
        UserError::Storage,
    )
    .await
}

pub(super) async fn get_all_users_postgres(pool: &Pool<Postgres>) -> Result<Vec<User>, UserError> {
    let table_name = DB_TABLE_USERS.as_str();

    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM {table_name} ORDER BY sequence_number ASC"
    ))
    .fetch_all(pool)
    .await?)
}

pub(super) async fn get_user_by_field_postgres(
    pool: &Pool<Postgres>,
    field: &UserSearchField,
) -> Result<Option<User>, UserError> {
    let table_name = DB_TABLE_USERS.as_str();

    let (condition, value) = match field {
        UserSearchField::Id(id) => ("id = $1", id),
        UserSearchField::Username(username) => ("lower(username) = lower($1)", username),
        UserSearchField::Email(email) => ("lower(email) = lower($1)", email),
    };

    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM {table_name} WHERE {condition} ORDER BY sequence_number ASC LIMIT 1"
    ))
    .bind(value)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn upsert_user_postgres(
    pool: &Pool<Postgres>,
    user: User,
) -> Result<User, UserError> {
    let table_name = DB_TABLE_USERS.as_str();
    let now = chrono::Utc::now();

    Ok(sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO {table_name}
            (id, username, email, first_name, last_name, password_hash, is_active, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            username = EXCLUDED.username,
            email = EXCLUDED.email,
            first_name = EXCLUDED.first_name,
            last_name = EXCLUDED.last_name,
            password_hash = EXCLUDED.password_hash,
            is_active = EXCLUDED.is_active,
            updated_at = EXCLUDED.updated_at
        RETURNING *
        "#
    ))
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.password_hash)
    .bind(user.is_active)
    .bind(user.created_at)
    .bind(now)
    .fetch_one(pool)
    .await?)
}

pub(super) async fn delete_user_postgres(pool: &Pool<Postgres>, id: &str) -> Result<(), UserError> {
    let table_name = DB_TABLE_USERS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE id = $1"))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
