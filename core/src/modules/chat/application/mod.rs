// Chat Application Layer - 应用层
//
// - session_store: 会话状态的唯一可写入口，每次变更后整体写回存储
// - gateway: 宿主模型会话的生命周期
// - stream_reducer: 把流式增量折叠成一条消息
// - commands: 命令处理器

pub mod commands;
pub mod gateway;
pub mod session_store;
pub mod stream_reducer;

pub use commands::*;
pub use gateway::*;
pub use session_store::*;
pub use stream_reducer::*;

use async_trait::async_trait;
use thiserror::Error;

use super::ports::RepositoryError;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// 命令处理器 trait
///
/// 命令处理器负责执行有副作用的操作
#[async_trait]
pub trait CommandHandler<C, R>: Send + Sync
where
    C: Send + Sync,
{
    /// 执行命令
    async fn handle(&self, command: C) -> Result<R, ApplicationError>;
}
