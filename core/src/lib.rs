pub mod infrastructure;
pub mod modules;
pub mod shared;

use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use modules::chat::{ChatSettings, ModelCapability};
use modules::config::{ConfigService, LogLevel, StoreConfigRepository};
use modules::ChatModule;
use shared::{AppResult, BrowserVersion};

/// 初始化日志
///
/// `RUST_LOG` 优先于配置中的级别；重复调用不会覆盖已安装的订阅者
pub fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// 启动聊天核心
///
/// 读取配置、打开会话存储并恢复状态、初始化模型会话。
/// 文件存储不可用时退回内存存储
///
/// # Arguments
/// * `data_dir` - 应用数据目录
/// * `capability` - 宿主模型能力，宿主不提供时为 None
/// * `browser` - 宿主浏览器版本，未知时为 None
pub async fn bootstrap(
    data_dir: PathBuf,
    capability: Option<Arc<dyn ModelCapability>>,
    browser: Option<BrowserVersion>,
) -> AppResult<ChatModule> {
    let config_service = ConfigService::new(Arc::new(StoreConfigRepository::new(
        data_dir.clone(),
    )));
    let config = config_service.get_all().await?;

    init_tracing(config.general.log_level);
    tracing::info!("NanoChat starting...");
    tracing::info!("App data directory: {:?}", data_dir);

    if let Some(version) = browser {
        tracing::info!("Browser version: {}", version);
    }

    let settings = ChatSettings {
        storage_key: config.storage.storage_key.clone(),
        stream_by_default: config.chat.stream_response,
        session_options: config.model.session_options(),
        min_browser_major: config.chat.min_browser_major,
        browser,
    };

    let chat_module =
        match ChatModule::new_with_persistence(data_dir, capability.clone(), settings.clone())
            .await
        {
            Ok(module) => {
                tracing::info!("Chat module initialized with persistent storage");
                module
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize persistent storage: {}, falling back to memory",
                    e
                );
                ChatModule::new(capability, settings).await
            }
        };

    Ok(chat_module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modules::chat::{
        GatewayState, MockModelCapability, MockScript, SendMessageCommand, TurnOutcome,
    };
    use modules::config::{AppConfig, PartialAppConfig, PartialChatConfig};
    use tempfile::TempDir;

    fn capability() -> Option<Arc<dyn ModelCapability>> {
        Some(Arc::new(
            MockModelCapability::new().with_script(MockScript::reply(["ok"])),
        ))
    }

    #[tokio::test]
    async fn test_bootstrap_with_file_storage() {
        let temp_dir = TempDir::new().unwrap();
        let module = bootstrap(temp_dir.path().to_path_buf(), capability(), None)
            .await
            .unwrap();

        assert_eq!(module.gateway().state().await, GatewayState::Ready);
        module
            .send_message(SendMessageCommand::new("hello"))
            .await
            .unwrap();

        assert!(temp_dir.path().join("geminiNanoChatSessions.json").exists());
    }

    #[tokio::test]
    async fn test_bootstrap_applies_config() {
        let temp_dir = TempDir::new().unwrap();
        let service = ConfigService::new(Arc::new(StoreConfigRepository::new(
            temp_dir.path().to_path_buf(),
        )));
        service
            .update(PartialAppConfig {
                chat: Some(PartialChatConfig {
                    stream_response: Some(false),
                    min_browser_major: Some(130),
                }),
                ..Default::default()
            })
            .await
            .unwrap();

        let module = bootstrap(
            temp_dir.path().to_path_buf(),
            capability(),
            Some(BrowserVersion::new(128, 0, 6545, 0)),
        )
        .await
        .unwrap();

        assert!(!module.store().is_streaming().await);
        let response = module
            .send_message(SendMessageCommand::new("hello"))
            .await
            .unwrap();
        assert!(!response.streamed);
        assert!(matches!(response.outcome, TurnOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_falls_back_to_memory() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let module = bootstrap(blocker.join("data"), capability(), None)
            .await
            .unwrap();

        let session = module.store().add_session().await.unwrap();
        assert_eq!(session.title(), "Chat 1");
    }

    #[test]
    fn test_default_log_level() {
        assert_eq!(AppConfig::default().general.log_level, LogLevel::Info);
        init_tracing(LogLevel::Debug);
        init_tracing(LogLevel::Info);
    }
}
