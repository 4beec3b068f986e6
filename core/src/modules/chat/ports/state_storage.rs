use async_trait::async_trait;
use thiserror::Error;

/// 仓储错误类型
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::SerializationError(err.to_string())
    }
}

/// 状态存储端口
///
/// 按固定键存取一整块序列化后的状态，每次写入都是完整覆盖
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// 读取键对应的数据，不存在时返回 None
    async fn load(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    /// 覆盖写入
    async fn save(&self, key: &str, blob: &str) -> Result<(), RepositoryError>;
}
