// Config Domain Entities
//
// 配置领域实体定义

use serde::{Deserialize, Serialize};

use super::value_objects::LogLevel;
use crate::modules::chat::ports::SessionOptions;
use crate::shared::MIN_BROWSER_MAJOR;

/// 会话快照的默认存储键
pub const DEFAULT_STORAGE_KEY: &str = "geminiNanoChatSessions";

/// 通用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeneralConfig {
    pub log_level: LogLevel,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    pub storage_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// 模型会话参数，缺省时交给宿主决定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl ModelConfig {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            temperature: self.temperature,
            top_k: self.top_k,
        }
    }
}

/// 聊天配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatConfig {
    /// 没有已保存状态时的流式偏好
    pub stream_response: bool,
    pub min_browser_major: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream_response: true,
            min_browser_major: MIN_BROWSER_MAJOR,
        }
    }
}

/// 应用配置聚合根
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    /// 创建新的默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并部分配置更新
    pub fn merge(&mut self, partial: PartialAppConfig) {
        if let Some(general) = partial.general {
            if let Some(log_level) = general.log_level {
                self.general.log_level = log_level;
            }
        }

        if let Some(storage) = partial.storage {
            if let Some(storage_key) = storage.storage_key {
                self.storage.storage_key = storage_key;
            }
        }

        if let Some(model) = partial.model {
            if let Some(temperature) = model.temperature {
                self.model.temperature = Some(temperature);
            }
            if let Some(top_k) = model.top_k {
                self.model.top_k = Some(top_k);
            }
        }

        if let Some(chat) = partial.chat {
            if let Some(stream_response) = chat.stream_response {
                self.chat.stream_response = stream_response;
            }
            if let Some(min_browser_major) = chat.min_browser_major {
                self.chat.min_browser_major = min_browser_major;
            }
        }
    }

    /// 验证配置是否有效
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.storage.storage_key.trim().is_empty() {
            errors.push("Storage key must not be empty".to_string());
        }

        if let Some(temperature) = self.model.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                errors.push("Temperature must be between 0 and 2".to_string());
            }
        }

        if self.model.top_k == Some(0) {
            errors.push("Top-K must be at least 1".to_string());
        }

        if self.chat.min_browser_major == 0 {
            errors.push("Minimum browser version must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// 部分配置更新（用于合并）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialAppConfig {
    pub general: Option<PartialGeneralConfig>,
    pub storage: Option<PartialStorageConfig>,
    pub model: Option<PartialModelConfig>,
    pub chat: Option<PartialChatConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialGeneralConfig {
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialStorageConfig {
    pub storage_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialModelConfig {
    pub temperature: Option<f32>,
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartialChatConfig {
    pub stream_response: Option<bool>,
    pub min_browser_major: Option<u32>,
}
