// Chat Module - 聊天模块
//
// 实现六边形架构（Hexagonal Architecture）：
// - domain: 领域层，包含实体、值对象、领域服务和领域事件
// - ports: 端口层，定义与外部世界的抽象接口
// - infrastructure: 基础设施层，实现端口的具体适配器
// - application: 应用层，会话存储、模型网关、流式折叠和命令处理器

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// 重新导出常用类型
pub use application::{
    ApplicationError, CommandHandler, GatewayError, GatewayState, ModelSessionGateway,
    ReduceError, SendMessageCommand, SendMessageHandler, SendMessageResponse, SessionStore,
    StreamReducer, TextStream, TurnOutcome, MAX_MESSAGE_LENGTH,
};

pub use domain::{
    ChatDomainEvent, ChatFailure, ChatMessage, ChatSession, ChatState, ErrorClassifier,
    FailureKind, PersistedState, SessionId,
};

pub use infrastructure::{
    FileStateStorage, InMemoryStateStorage, MockModelCapability, MockModelSession, MockScript,
};

pub use ports::{
    Availability, DeltaStream, ModelCapability, ModelError, ModelSession, RepositoryError,
    SessionOptions, StateStorage,
};

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::infrastructure::{AppEvent, EventBus};
use crate::shared::BrowserVersion;

/// 聊天模块的装配参数
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// 会话快照的存储键
    pub storage_key: String,
    /// 没有已保存状态时的流式偏好
    pub stream_by_default: bool,
    pub session_options: SessionOptions,
    pub min_browser_major: u32,
    /// 宿主浏览器版本，未知时不做版本拦截
    pub browser: Option<BrowserVersion>,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            storage_key: crate::modules::config::DEFAULT_STORAGE_KEY.to_string(),
            stream_by_default: true,
            session_options: SessionOptions::default(),
            min_browser_major: crate::shared::MIN_BROWSER_MAJOR,
            browser: None,
        }
    }
}

/// Chat 模块容器
///
/// 管理模块内的依赖注入
pub struct ChatModule {
    store: Arc<SessionStore>,
    gateway: Arc<ModelSessionGateway>,
    event_bus: Arc<EventBus>,
    classifier: ErrorClassifier,
    send_message_handler: SendMessageHandler,
}

impl ChatModule {
    /// 创建新的 ChatModule 实例（内存存储，用于开发测试）
    pub async fn new(
        capability: Option<Arc<dyn ModelCapability>>,
        settings: ChatSettings,
    ) -> Self {
        let storage: Arc<dyn StateStorage> = Arc::new(InMemoryStateStorage::new());
        Self::with_storage(storage, capability, settings).await
    }

    /// 创建带持久化存储的 ChatModule 实例
    ///
    /// # Arguments
    /// * `data_dir` - 应用数据目录路径
    ///
    /// # Errors
    /// 如果无法初始化文件存储，返回错误
    pub async fn new_with_persistence(
        data_dir: PathBuf,
        capability: Option<Arc<dyn ModelCapability>>,
        settings: ChatSettings,
    ) -> Result<Self, RepositoryError> {
        let storage: Arc<dyn StateStorage> = Arc::new(FileStateStorage::new(data_dir).await?);
        Ok(Self::with_storage(storage, capability, settings).await)
    }

    /// 使用自定义存储创建 ChatModule
    ///
    /// 恢复已保存的会话，并尝试建立模型会话；模型不可用不影响模块创建
    pub async fn with_storage(
        storage: Arc<dyn StateStorage>,
        capability: Option<Arc<dyn ModelCapability>>,
        settings: ChatSettings,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new());

        let store = Arc::new(
            SessionStore::new(storage, settings.storage_key.clone())
                .with_streaming_default(settings.stream_by_default)
                .with_event_bus(event_bus.clone()),
        );
        store.hydrate().await;

        let gateway = Arc::new(ModelSessionGateway::new(
            capability,
            settings.session_options,
        ));
        if let Err(e) = gateway.initialize().await {
            tracing::warn!("[ChatModule] Model unavailable, replies will explain why: {}", e);
        }

        let classifier = ErrorClassifier::new(settings.min_browser_major);
        let send_message_handler =
            SendMessageHandler::new(store.clone(), gateway.clone(), classifier.clone())
                .with_browser(settings.browser)
                .with_event_bus(event_bus.clone());

        Self {
            store,
            gateway,
            event_bus,
            classifier,
            send_message_handler,
        }
    }

    // Command handlers

    /// 发送消息
    pub async fn send_message(
        &self,
        command: SendMessageCommand,
    ) -> Result<SendMessageResponse, ApplicationError> {
        self.send_message_handler.handle(command).await
    }

    /// 渲染自由文本形式的失败说明
    pub fn explain(&self, description: Option<&str>) -> String {
        self.classifier.render_description(description)
    }

    /// 取消进行中的回合并释放模型会话
    pub async fn shutdown(&self) {
        self.send_message_handler.shutdown();
        self.gateway.destroy().await;
    }

    // Accessors

    /// 获取会话存储
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// 获取模型网关
    pub fn gateway(&self) -> &Arc<ModelSessionGateway> {
        &self.gateway
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_bus.subscribe()
    }
}
