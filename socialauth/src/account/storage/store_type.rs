use crate::account::{
    errors::AccountError,
    types::{EmailAddress, normalize_email},
};
use crate::storage::GENERIC_DATA_STORE;

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct EmailAddressStore;

impl EmailAddressStore {
    pub(crate) async fn init() -> Result<(), AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => {
                create_tables_sqlite(pool).await?;
                validate_email_tables_sqlite(pool).await
            }
            (_, Some(pool)) => {
                create_tables_postgres(pool).await?;
                validate_email_tables_postgres(pool).await
            }
            _ => Err(AccountError::Storage("Unsupported database type".to_string())),
        }
    }

    /// Insert or update an address. Saving a primary address demotes the
    /// user's other addresses in the same transaction.
    #[tracing::instrument(skip(address), fields(user_id = %address.user_id))]
    pub(crate) async fn add_email(address: EmailAddress) -> Result<EmailAddress, AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            upsert_email_sqlite(pool, &address).await
        } else if let Some(pool) = store.as_postgres() {
            upsert_email_postgres(pool, &address).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }
    }

    /// All addresses of a user, primary first
    pub(crate) async fn get_emails(user_id: &str) -> Result<Vec<EmailAddress>, AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_emails_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_emails_postgres(pool, user_id).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_email(
        user_id: &str,
        email: &str,
    ) -> Result<Option<EmailAddress>, AccountError> {
        let email = normalize_email(email);
        Ok(Self::get_emails(user_id)
            .await?
            .into_iter()
            .find(|a| a.email == email))
    }

    pub(crate) async fn get_primary(user_id: &str) -> Result<Option<EmailAddress>, AccountError> {
        Ok(Self::get_emails(user_id)
            .await?
            .into_iter()
            .find(|a| a.primary))
    }

    /// Addresses matching `email` case-insensitively across all users,
    /// verified ones first.
    pub(crate) async fn find_by_email(email: &str) -> Result<Vec<EmailAddress>, AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let email = normalize_email(email);

        if let Some(pool) = store.as_sqlite() {
            find_by_email_sqlite(pool, &email).await
        } else if let Some(pool) = store.as_postgres() {
            find_by_email_postgres(pool, &email).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }
    }

    /// Make `email` the user's primary address, demoting the previous one.
    #[tracing::instrument]
    pub(crate) async fn set_primary(user_id: &str, email: &str) -> Result<(), AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let email = normalize_email(email);

        let updated = if let Some(pool) = store.as_sqlite() {
            set_primary_sqlite(pool, user_id, &email).await
        } else if let Some(pool) = store.as_postgres() {
            set_primary_postgres(pool, user_id, &email).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }?;

        if updated {
            Ok(())
        } else {
            Err(AccountError::EmailNotFound)
        }
    }

    #[tracing::instrument]
    pub(crate) async fn mark_verified(user_id: &str, email: &str) -> Result<(), AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let email = normalize_email(email);

        let updated = if let Some(pool) = store.as_sqlite() {
            mark_verified_sqlite(pool, user_id, &email).await
        } else if let Some(pool) = store.as_postgres() {
            mark_verified_postgres(pool, user_id, &email).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }?;

        if updated {
            Ok(())
        } else {
            Err(AccountError::EmailNotFound)
        }
    }

    #[tracing::instrument]
    pub(crate) async fn delete_email(user_id: &str, email: &str) -> Result<(), AccountError> {
        let store = GENERIC_DATA_STORE.lock().await;
        let email = normalize_email(email);

        if let Some(pool) = store.as_sqlite() {
            delete_email_sqlite(pool, user_id, &email).await
        } else if let Some(pool) = store.as_postgres() {
            delete_email_postgres(pool, user_id, &email).await
        } else {
            Err(AccountError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn has_verified_email(user_id: &str) -> Result<bool, AccountError> {
        Ok(Self::get_emails(user_id)
            .await?
            .iter()
            .any(|a| a.verified))
    }
}
