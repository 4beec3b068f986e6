// Config Module
//
// 配置管理模块，采用六边形架构
//
// 层次结构:
// - domain: 领域层，包含配置实体和值对象
// - ports: 端口层，定义配置存储的抽象接口
// - infrastructure: 基础设施层，实现具体的配置存储适配器
// - application: 应用层，配置服务门面

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;

// 重新导出常用类型

// Domain
pub use domain::{
    AppConfig, ChatConfig, GeneralConfig, LogLevel, ModelConfig, PartialAppConfig,
    PartialChatConfig, PartialGeneralConfig, PartialModelConfig, PartialStorageConfig,
    StorageConfig, DEFAULT_STORAGE_KEY,
};

// Ports
pub use ports::{ConfigError, ConfigRepository};

// Infrastructure
pub use infrastructure::{InMemoryConfigRepository, StoreConfigRepository};

// Application
pub use application::ConfigService;
