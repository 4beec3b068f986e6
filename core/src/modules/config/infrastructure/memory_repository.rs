// In-Memory Config Repository
//
// 基于内存的配置仓储实现（用于测试和开发）

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::modules::config::domain::AppConfig;
use crate::modules::config::ports::{ConfigError, ConfigRepository};

/// 内存配置仓储
pub struct InMemoryConfigRepository {
    config: Arc<RwLock<Option<AppConfig>>>,
}

impl InMemoryConfigRepository {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(Some(config))),
        }
    }
}

impl Default for InMemoryConfigRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigRepository for InMemoryConfigRepository {
    async fn load(&self) -> Result<AppConfig, ConfigError> {
        let config = self.config.read().await;
        Ok(config.clone().unwrap_or_default())
    }

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let mut current = self.config.write().await;
        *current = Some(config.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConfigError> {
        let mut config = self.config.write().await;
        *config = None;
        Ok(())
    }

    async fn exists(&self) -> Result<bool, ConfigError> {
        Ok(self.config.read().await.is_some())
    }
}
