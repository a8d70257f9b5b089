use crate::socialaccount::errors::SocialError;
use crate::socialaccount::types::{SocialAccount, SocialToken};
use crate::storage::GENERIC_DATA_STORE;

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct SocialAccountStore;

impl SocialAccountStore {
    pub(crate) async fn init() -> Result<(), SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => {
                create_tables_sqlite(pool).await?;
                validate_social_tables_sqlite(pool).await
            }
            (_, Some(pool)) => {
                create_tables_postgres(pool).await?;
                validate_social_tables_postgres(pool).await
            }
            _ => Err(SocialError::Storage("Unsupported database type".to_string())),
        }
    }

    pub(crate) async fn get_by_provider_uid(
        provider: &str,
        uid: &str,
    ) -> Result<Option<SocialAccount>, SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_account_by_uid_sqlite(pool, provider, uid).await
        } else if let Some(pool) = store.as_postgres() {
            get_account_by_uid_postgres(pool, provider, uid).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_account(id: &str) -> Result<Option<SocialAccount>, SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_account_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            get_account_postgres(pool, id).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_accounts_by_user(
        user_id: &str,
    ) -> Result<Vec<SocialAccount>, SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_accounts_by_user_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_accounts_by_user_postgres(pool, user_id).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    #[tracing::instrument(skip(account), fields(provider = %account.provider, user_id = %account.user_id))]
    pub(crate) async fn insert_account(account: &SocialAccount) -> Result<(), SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_account_sqlite(pool, account).await
        } else if let Some(pool) = store.as_postgres() {
            insert_account_postgres(pool, account).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    #[tracing::instrument(skip(account), fields(account_id = %account.id))]
    pub(crate) async fn update_account(account: &SocialAccount) -> Result<(), SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let updated = if let Some(pool) = store.as_sqlite() {
            update_account_sqlite(pool, account).await
        } else if let Some(pool) = store.as_postgres() {
            update_account_postgres(pool, account).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }?;

        if updated {
            Ok(())
        } else {
            Err(SocialError::AccountNotFound)
        }
    }

    /// Delete a binding together with its tokens.
    #[tracing::instrument]
    pub(crate) async fn delete_account(id: &str) -> Result<(), SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_account_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_account_postgres(pool, id).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_token(account_id: &str) -> Result<Option<SocialToken>, SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_token_sqlite(pool, account_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_token_postgres(pool, account_id).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }

    #[tracing::instrument(skip(token), fields(account_id = %token.account_id))]
    pub(crate) async fn upsert_token(token: &SocialToken) -> Result<SocialToken, SocialError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_token_sqlite(pool, token).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_token_postgres(pool, token).await
        } else {
            Err(SocialError::Storage("Unsupported database type".to_string()))
        }
    }
}
