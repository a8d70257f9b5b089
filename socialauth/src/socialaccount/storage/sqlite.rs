use sqlx::{Pool, Sqlite, types::Json};

use crate::socialaccount::errors::SocialError;
use crate::socialaccount::types::{SocialAccount, SocialToken};
use crate::storage::validate_sqlite_table_schema;

use super::config::{DB_TABLE_SOCIAL_ACCOUNTS, DB_TABLE_SOCIAL_TOKENS};

pub(super) async fn create_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), SocialError> {
    let accounts_table = DB_TABLE_SOCIAL_ACCOUNTS.as_str();
    let tokens_table = DB_TABLE_SOCIAL_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {accounts_table} (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            provider TEXT NOT NULL,
            uid TEXT NOT NULL,
            extra_data TEXT NOT NULL,
            last_login TIMESTAMP NOT NULL,
            date_joined TIMESTAMP NOT NULL,
            UNIQUE (provider, uid)
        )
        "#
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{accounts_table}_user_id ON {accounts_table}(user_id)"
    ))
    .execute(pool)
    .await?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {tokens_table} (
            id TEXT PRIMARY KEY NOT NULL,
            account_id TEXT NOT NULL REFERENCES {accounts_table}(id) ON DELETE CASCADE,
            provider TEXT NOT NULL,
            token TEXT NOT NULL,
            token_secret TEXT,
            expires_at TIMESTAMP,
            UNIQUE (account_id, provider)
        )
        "#
    ))
    .execute(pool)
    .await?;

    Ok(())
}

pub(super) async fn validate_social_tables_sqlite(pool: &Pool<Sqlite>) -> Result<(), SocialError> {
    let account_columns = [
        ("id", "TEXT"),
        ("user_id", "TEXT"),
        ("provider", "TEXT"),
        ("uid", "TEXT"),
        ("extra_data", "TEXT"),
        ("last_login", "TIMESTAMP"),
        ("date_joined", "TIMESTAMP"),
    ];
    validate_sqlite_table_schema(
        pool,
        DB_TABLE_SOCIAL_ACCOUNTS.as_str(),
        &account_columns,
        SocialError::Storage,
    )
    .await?;

    let token_columns = [
        ("id", "TEXT"),
        ("account_id", "TEXT"),
        ("provider", "TEXT"),
        ("token", "TEXT"),
        ("token_secret", "TEXT"),
        ("expires_at", "TIMESTAMP"),
    ];
    validate_sqlite_table_schema(
        pool,
        DB_TABLE_SOCIAL_TOKENS.as_str(),
        &token_columns,
        SocialError::Storage,
    )
    .await
}

pub(super) async fn get_account_by_uid_sqlite(
    pool: &Pool<Sqlite>,
    provider: &str,
    uid: &str,
) -> Result<Option<SocialAccount>, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_ACCOUNTS.as_str();

    Ok(sqlx::query_as::<_, SocialAccount>(&format!(
        "SELECT * FROM {table_name} WHERE provider = ? AND uid = ?"
    ))
    .bind(provider)
    .bind(uid)
    .fetch_optional(pool)
    .await?)
}

pub(super) async fn get_account_sqlite(
    pool: &Pool<Sqlite>,
    id: &str,
) -> Result<Option<SocialAccount>, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_ACCOUNTS.as_str();

    Ok(
        sqlx::query_as::<_, SocialAccount>(&format!("SELECT * FROM {table_name} WHERE id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?,
    )
}

pub(super) async fn get_accounts_by_user_sqlite(
    pool: &Pool<Sqlite>,
    user_id: &str,
) -> Result<Vec<SocialAccount>, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_ACCOUNTS.as_str();

    Ok(sqlx::query_as::<_, SocialAccount>(&format!(
        "SELECT * FROM {table_name} WHERE user_id = ? ORDER BY date_joined ASC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Insert a new binding. The (provider, uid) constraint rejects a second owner.
pub(super) async fn insert_account_sqlite(
    pool: &Pool<Sqlite>,
    account: &SocialAccount,
) -> Result<(), SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_ACCOUNTS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, user_id, provider, uid, extra_data, last_login, date_joined)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#
    ))
    .bind(&account.id)
    .bind(&account.user_id)
    .bind(&account.provider)
    .bind(&account.uid)
    .bind(Json(&account.extra_data))
    .bind(account.last_login)
    .bind(account.date_joined)
    .execute(pool)
    .await?;

    Ok(())
}

/// Refresh provider data of an existing binding; ownership never changes here.
pub(super) async fn update_account_sqlite(
    pool: &Pool<Sqlite>,
    account: &SocialAccount,
) -> Result<bool, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_ACCOUNTS.as_str();

    let result = sqlx::query(&format!(
        "UPDATE {table_name} SET extra_data = ?, last_login = ? WHERE id = ?"
    ))
    .bind(Json(&account.extra_data))
    .bind(account.last_login)
    .bind(&account.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(super) async fn delete_account_sqlite(pool: &Pool<Sqlite>, id: &str) -> Result<(), SocialError> {
    create_tables_sqlite(pool).await?;

    let accounts_table = DB_TABLE_SOCIAL_ACCOUNTS.as_str();
    let tokens_table = DB_TABLE_SOCIAL_TOKENS.as_str();
    let mut tx = pool.begin().await?;

    sqlx::query(&format!("DELETE FROM {tokens_table} WHERE account_id = ?"))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(&format!("DELETE FROM {accounts_table} WHERE id = ?"))
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub(super) async fn get_token_sqlite(
    pool: &Pool<Sqlite>,
    account_id: &str,
) -> Result<Option<SocialToken>, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_TOKENS.as_str();

    Ok(sqlx::query_as::<_, SocialToken>(&format!(
        "SELECT * FROM {table_name} WHERE account_id = ?"
    ))
    .bind(account_id)
    .fetch_optional(pool)
    .await?)
}

/// Upsert on (account_id, provider). A missing refresh token keeps the stored one.
pub(super) async fn upsert_token_sqlite(
    pool: &Pool<Sqlite>,
    token: &SocialToken,
) -> Result<SocialToken, SocialError> {
    create_tables_sqlite(pool).await?;

    let table_name = DB_TABLE_SOCIAL_TOKENS.as_str();

    sqlx::query(&format!(
        r#"
        INSERT INTO {table_name} (id, account_id, provider, token, token_secret, expires_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT (account_id, provider) DO UPDATE SET
            token = excluded.token,
            token_secret = COALESCE(excluded.token_secret, {table_name}.token_secret),
            expires_at = excluded.expires_at
        "#
    ))
    .bind(&token.id)
    .bind(&token.account_id)
    .bind(&token.provider)
    .bind(&token.token)
    .bind(&token.token_secret)
    .bind(token.expires_at)
    .execute(pool)
    .await?;

    Ok(sqlx::query_as::<_, SocialToken>(&format!(
        "SELECT * FROM {table_name} WHERE account_id = ? AND provider = ?"
    ))
    .bind(&token.account_id)
    .bind(&token.provider)
    .fetch_one(pool)
    .await?)
}
