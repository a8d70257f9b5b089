use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub(crate) enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Json conversion(Serde) error: {0}")]
    Serde(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<redis::RedisError> for StorageError {
    fn from(err: redis::RedisError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let error = StorageError::Storage("Connection failed".to_string());
        assert_eq!(error.to_string(), "Storage error: Connection failed");

        let error = StorageError::Serde("Invalid JSON".to_string());
        assert_eq!(error.to_string(), "Json conversion(Serde) error: Invalid JSON");
    }

    #[test]
    fn test_from_redis_error() {
        let redis_error =
            redis::RedisError::from((redis::ErrorKind::IoError, "Connection refused"));

        match StorageError::from(redis_error) {
            StorageError::Storage(msg) => assert!(msg.contains("Connection refused")),
            other => panic!("Expected Storage variant, got {other:?}"),
        }
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();

        assert!(matches!(
            StorageError::from(serde_error),
            StorageError::Serde(_)
        ));
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<StorageError>();
    }
}
