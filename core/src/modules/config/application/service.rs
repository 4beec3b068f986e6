// Config Service
//
// 配置服务门面，提供统一的 API

use std::sync::Arc;

use crate::modules::config::domain::{AppConfig, PartialAppConfig};
use crate::modules::config::ports::{ConfigError, ConfigRepository};

/// 配置服务
pub struct ConfigService {
    repository: Arc<dyn ConfigRepository>,
}

impl ConfigService {
    pub fn new(repository: Arc<dyn ConfigRepository>) -> Self {
        Self { repository }
    }

    /// 获取仓储引用
    pub fn repository(&self) -> &Arc<dyn ConfigRepository> {
        &self.repository
    }

    /// 获取完整配置
    pub async fn get_all(&self) -> Result<AppConfig, ConfigError> {
        self.repository.load().await
    }

    /// 合并部分更新，校验通过后保存
    pub async fn update(&self, partial: PartialAppConfig) -> Result<AppConfig, ConfigError> {
        let mut config = self.repository.load().await?;
        config.merge(partial);
        config
            .validate()
            .map_err(|errors| ConfigError::ValidationError { errors })?;

        self.repository.save(&config).await?;
        tracing::info!("[ConfigService] Configuration updated");
        Ok(config)
    }

    /// 重置为默认配置
    pub async fn reset(&self) -> Result<AppConfig, ConfigError> {
        self.repository.clear().await?;
        let config = AppConfig::default();
        self.repository.save(&config).await?;
        tracing::info!("[ConfigService] Configuration reset to defaults");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::config::domain::{PartialChatConfig, PartialModelConfig};
    use crate::modules::config::infrastructure::{InMemoryConfigRepository, StoreConfigRepository};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_service() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        let service = ConfigService::new(repo);

        let config = service.get_all().await.unwrap();
        assert!(config.chat.stream_response);

        let updated = service
            .update(PartialAppConfig {
                chat: Some(PartialChatConfig {
                    stream_response: Some(false),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!updated.chat.stream_response);
        assert!(!service.get_all().await.unwrap().chat.stream_response);

        let reset = service.reset().await.unwrap();
        assert!(reset.chat.stream_response);
    }

    #[tokio::test]
    async fn test_invalid_update_is_rejected() {
        let repo = Arc::new(InMemoryConfigRepository::new());
        let service = ConfigService::new(repo);

        let result = service
            .update(PartialAppConfig {
                model: Some(PartialModelConfig {
                    top_k: Some(0),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
        assert_eq!(service.get_all().await.unwrap().model.top_k, None);
    }

    #[tokio::test]
    async fn test_update_persists_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(Arc::new(StoreConfigRepository::new(
            temp_dir.path().to_path_buf(),
        )));

        service
            .update(PartialAppConfig {
                chat: Some(PartialChatConfig {
                    min_browser_major: Some(130),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        let reopened = ConfigService::new(Arc::new(StoreConfigRepository::new(
            temp_dir.path().to_path_buf(),
        )));
        assert_eq!(reopened.get_all().await.unwrap().chat.min_browser_major, 130);
    }
}
