use sqlx::{Pool, Sqlite};

use crate::storage::validate_sqlite_table_schema;
use crate::userdb::{
    errors::UserError,
    types::{User, UserSearchField},
};

use super::config::DB_TABLE_USERS;

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let table_name = DB_TABLE_USERS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table_name} (
            sequence_number INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            username TEXT UNIQUE COLLATE NOCASE,
            email TEXT,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            password_hash TEXT,
            is_active BOOLEAN NOT NULL DEFAULT true,
            created_at TIMESTAMP NOT NULL,
            updated_at TIMESTAMP NOT NULL
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_user_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), UserError> {
    let expected_columns = [
        ("sequence_number", "INTEGER"),
        ("id", "TEXT"),
        ("username", "TEXT"),
        ("email", "TEXT"),
        ("first_name", "TEXT"),
        ("last_name", "TEXT"),
        ("password_hash", "TEXT"),
        ("is_active", "BOOLEAN"),
        ("created_at", "TIMESTAMP"),
        ("updated_at", "TIMESTAMP"),
    ];

    validate_sqlite_table_schema(
        pool,
        DB_TABLE_USERS.as_str(),
        &expected_columns,
        UserError::Storage,
    )
    .await
}

pub(super) async fn get_all_users_sqlite(pool: &Pool<Sqlite>) -> Result<Vec<User>, UserError> {
    // In-memory databases vanish with their last connection
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USERS.as_str();

    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM {table_name} ORDER BY sequence_number ASC"
    ))
    .fetch_all(pool)
    .await?)
}

pub(super) async fn get_user_by_field_sqlite(
    pool: &Pool<Sqlite>,
    field: &UserSearchField,
) -> Result<Option<User>, UserError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USERS.as_str();

    let (condition, value) = match field {
        UserSearchField::Id(id) => ("id = ?", id),
        UserSearchField::Username(username) => ("username = ? COLLATE NOCASE", username),
        UserSearchField::Email(email) => ("lower(email) = lower(?)", email),
    };

    Ok(sqlx::query_as::<_, User>(&format!(
        "SELECT * FROM {table_name} WHERE {condition} ORDER BY sequence_number ASC LIMIT 1"
    ))
    .bind(value)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn upsert_user_sqlite(pool: &Pool<Sqlite>, user: User) -> Result<User, UserError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USERS.as_str();
    let now = chrono::Utc::now();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name}
            (id, username, email, first_name, last_name, password_hash, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (id) DO UPDATE SET
            username = excluded.username,
            email = excluded.email,
            first_name = excluded.first_name,
            last_name = excluded.last_name,
            password_hash = excluded.password_hash,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
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
    .execute(pool)
    .await?;

    Ok(
        sqlx::query_as::<_, User>(&format!("SELECT * FROM {table_name} WHERE id = ?"))
            .bind(&user.id)
            .fetch_one(pool)
            .await?,
    )
}

pub(super) async fn delete_user_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), UserError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_USERS.as_str();

    sqlx::query(&format!("DELETE FROM {table_name} WHERE id = ?"))
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
