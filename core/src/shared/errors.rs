use thiserror::Error;

use crate::modules::chat::{ApplicationError, RepositoryError};
use crate::modules::config::ConfigError;

/// 应用启动与对外接口层的统一错误
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Storage error: {0}")]
    StorageError(#[from] RepositoryError),

    #[error("Chat error: {0}")]
    ChatError(#[from] ApplicationError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_serializes_as_message() {
        let err = AppError::Unknown("boom".to_string());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Unknown error: boom\"");
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: AppError = RepositoryError::StorageError("disk full".to_string()).into();
        assert!(matches!(err, AppError::StorageError(_)));
        assert_eq!(err.to_string(), "Storage error: Storage error: disk full");
    }
}
