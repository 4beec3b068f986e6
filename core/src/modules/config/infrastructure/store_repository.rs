// File-backed Config Repository
//
// 配置以 JSON 文件保存在应用数据目录下

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::modules::config::domain::AppConfig;
use crate::modules::config::ports::{ConfigError, ConfigRepository};

const CONFIG_FILE_NAME: &str = "config.json";

/// 文件配置仓储
pub struct StoreConfigRepository {
    /// 配置文件路径
    config_path: PathBuf,
    /// 内存缓存
    cache: Arc<RwLock<Option<AppConfig>>>,
}

impl StoreConfigRepository {
    /// 创建新的配置仓储
    ///
    /// # Arguments
    /// * `app_data_dir` - 应用数据目录
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            config_path: app_data_dir.join(CONFIG_FILE_NAME),
            cache: Arc::new(RwLock::new(None)),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 从文件加载配置
    async fn load_from_file(&self) -> Result<Option<AppConfig>, ConfigError> {
        if !self.config_path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| ConfigError::StorageError(e.to_string()))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        Ok(Some(config))
    }

    /// 保存配置到文件
    async fn save_to_file(&self, config: &AppConfig) -> Result<(), ConfigError> {
        // 确保目录存在
        if let Some(parent) = self.config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ConfigError::StorageError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(config)?;

        tokio::fs::write(&self.config_path, content)
            .await
            .map_err(|e| ConfigError::StorageError(e.to_string()))?;

        tracing::debug!("[StoreConfigRepository] Saved config to {:?}", self.config_path);
        Ok(())
    }
}

#[async_trait]
impl ConfigRepository for StoreConfigRepository {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        // 先检查缓存
        {
            let cache = self.cache.read().await;
            if let Some(ref config) = *cache {
                return Ok(config.clone());
            }
        }

        let config = self.load_from_file().await?.unwrap_or_default();

        {
            let mut cache = self.cache.write().await;
            *cache = Some(config.clone());
        }

        Ok(config)
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        self.save_to_file(config).await?;

        {
            let mut cache = self.cache.write().await;
            *cache = Some(config.clone());
        }

        Ok(())
    }

    async fn clear(&self) -> Result<(), ConfigError> {
        if self.config_path.exists() {
            tokio::fs::remove_file(&self.config_path)
                .await
                .map_err(|e| ConfigError::StorageError(e.to_string()))?;
        }

        let mut cache = self.cache.write().await;
        *cache = None;

        Ok(())
    }

    async fn exists(&self) -> Result<bool, ConfigError> {
        Ok(self.config_path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_loads_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let repo = StoreConfigRepository::new(temp_dir.path().to_path_buf());

        assert_eq!(repo.load().await.unwrap(), AppConfig::default());
        assert!(!repo.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_persistence_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let repo = StoreConfigRepository::new(temp_dir.path().to_path_buf());
            let mut config = AppConfig::default();
            config.model.temperature = Some(0.4);
            repo.save(&config).await.unwrap();
        }

        // 重新打开，验证数据仍在
        {
            let repo = StoreConfigRepository::new(temp_dir.path().to_path_buf());
            assert!(repo.exists().await.unwrap());
            assert_eq!(repo.load().await.unwrap().model.temperature, Some(0.4));
        }
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "not json")
            .await
            .unwrap();

        let repo = StoreConfigRepository::new(temp_dir.path().to_path_buf());
        assert!(matches!(
            repo.load().await,
            Err(ConfigError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let repo = StoreConfigRepository::new(temp_dir.path().to_path_buf());

        repo.save(&AppConfig::default()).await.unwrap();
        repo.clear().await.unwrap();

        assert!(!repo.config_path().exists());
    }
}
