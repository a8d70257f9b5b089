use serde_json::Value;

use crate::mfa::errors::MfaError;
use crate::mfa::types::{Authenticator, AuthenticatorType};
use crate::storage::GENERIC_DATA_STORE;

use super::postgres::*;
use super::sqlite::*;

pub(crate) struct AuthenticatorStore;

impl AuthenticatorStore {
    pub(crate) async fn init() -> Result<(), MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        match (store.as_sqlite(), store.as_postgres()) {
            (Some(pool), _) => {
                create_tables_sqlite(pool).await?;
                validate_authenticator_tables_sqlite(pool).await
            }
            (_, Some(pool)) => {
                create_tables_postgres(pool).await?;
                validate_authenticator_tables_postgres(pool).await
            }
            _ => Err(MfaError::Storage("Unsupported database type".to_string())),
        }
    }

    /// Insert a new authenticator. Fails if the user already has one of that type.
    #[tracing::instrument(skip(authenticator), fields(user_id = %authenticator.user_id, kind = ?authenticator.kind))]
    pub(crate) async fn insert(authenticator: &Authenticator) -> Result<(), MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            insert_authenticator_sqlite(pool, authenticator).await
        } else if let Some(pool) = store.as_postgres() {
            insert_authenticator_postgres(pool, authenticator).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_authenticators(user_id: &str) -> Result<Vec<Authenticator>, MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_authenticators_sqlite(pool, user_id).await
        } else if let Some(pool) = store.as_postgres() {
            get_authenticators_postgres(pool, user_id).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }
    }

    pub(crate) async fn get_authenticator(
        user_id: &str,
        kind: AuthenticatorType,
    ) -> Result<Option<Authenticator>, MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            get_authenticator_sqlite(pool, user_id, kind).await
        } else if let Some(pool) = store.as_postgres() {
            get_authenticator_postgres(pool, user_id, kind).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }
    }

    #[tracing::instrument(skip(data))]
    pub(crate) async fn update_data(id: &str, data: &Value) -> Result<(), MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        let updated = if let Some(pool) = store.as_sqlite() {
            update_data_sqlite(pool, id, data).await
        } else if let Some(pool) = store.as_postgres() {
            update_data_postgres(pool, id, data).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }?;

        if updated {
            Ok(())
        } else {
            Err(MfaError::NotFound)
        }
    }

    pub(crate) async fn record_usage(id: &str) -> Result<(), MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            record_usage_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            record_usage_postgres(pool, id).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }
    }

    #[tracing::instrument]
    pub(crate) async fn delete(id: &str) -> Result<(), MfaError> {
        let store = GENERIC_DATA_STORE.lock().await;

        if let Some(pool) = store.as_sqlite() {
            delete_authenticator_sqlite(pool, id).await
        } else if let Some(pool) = store.as_postgres() {
            delete_authenticator_postgres(pool, id).await
        } else {
            Err(MfaError::Storage("Unsupported database type".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{init_test_environment, unique_name};
    use serde_json::json;
    use serial_test::serial;

    #[tokio::test]
    #[serial]
    async fn test_authenticator_crud() {
        init_test_environment().await;
        let user_id = unique_name("mfa-user");

        let totp = Authenticator::new(&user_id, AuthenticatorType::Totp, json!({"secret": "ABC"}));
        AuthenticatorStore::insert(&totp).await.unwrap();

        let fetched = AuthenticatorStore::get_authenticator(&user_id, AuthenticatorType::Totp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, totp.id);
        assert_eq!(fetched.data["secret"], "ABC");
        assert!(fetched.last_used_at.is_none());

        AuthenticatorStore::update_data(&totp.id, &json!({"secret": "XYZ"}))
            .await
            .unwrap();
        AuthenticatorStore::record_usage(&totp.id).await.unwrap();
        let fetched = AuthenticatorStore::get_authenticator(&user_id, AuthenticatorType::Totp)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.data["secret"], "XYZ");
        assert!(fetched.last_used_at.is_some());

        AuthenticatorStore::delete(&totp.id).await.unwrap();
        assert!(
            AuthenticatorStore::get_authenticators(&user_id)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_one_authenticator_per_type() {
        init_test_environment().await;
        let user_id = unique_name("mfa-dup");

        let first = Authenticator::new(&user_id, AuthenticatorType::Totp, json!({}));
        AuthenticatorStore::insert(&first).await.unwrap();

        let second = Authenticator::new(&user_id, AuthenticatorType::Totp, json!({}));
        assert!(AuthenticatorStore::insert(&second).await.is_err());

        let codes = Authenticator::new(&user_id, AuthenticatorType::RecoveryCodes, json!({}));
        AuthenticatorStore::insert(&codes).await.unwrap();
        assert_eq!(
            AuthenticatorStore::get_authenticators(&user_id)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    #[serial]
    async fn test_update_missing_authenticator() {
        init_test_environment().await;
        let result = AuthenticatorStore::update_data("missing-id", &json!({})).await;
        assert!(matches!(result, Err(MfaError::NotFound)));
    }
}
