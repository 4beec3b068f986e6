use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::modules::chat::domain::{ChatFailure, FailureKind};
use crate::modules::chat::ports::{
    Availability, DeltaStream, ModelCapability, ModelError, ModelSession, SessionOptions,
};

/// 网关状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GatewayState {
    Uninitialized,
    Probing,
    Ready,
    Unavailable,
    Destroyed,
}

/// 网关错误
///
/// 宿主错误不分种类，类别在这里按文本推断一次后随错误携带
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("AI session creation failed: {0}")]
    CapabilityUnavailable(String),

    #[error("AI session is not initialized.")]
    NotInitialized,

    #[error("{message}")]
    Host { kind: FailureKind, message: String },
}

impl GatewayError {
    /// 请求阶段的宿主错误
    fn from_host(error: ModelError) -> Self {
        let message = error.to_string();
        GatewayError::Host {
            kind: FailureKind::infer(&message),
            message,
        }
    }

    /// 流读取阶段的宿主错误，无法归类时记为读流失败
    fn from_stream(error: ModelError) -> Self {
        let message = error.to_string();
        let kind = match FailureKind::infer(&message) {
            FailureKind::Unknown => FailureKind::StreamReadFailure,
            kind => kind,
        };
        GatewayError::Host { kind, message }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GatewayError::CapabilityUnavailable(_) => FailureKind::CapabilityUnavailable,
            GatewayError::NotInitialized => FailureKind::SessionUninitialized,
            GatewayError::Host { kind, .. } => *kind,
        }
    }

    pub fn to_failure(&self) -> ChatFailure {
        ChatFailure::new(self.kind(), self.to_string())
    }
}

/// 持有中的宿主会话，丢弃时释放宿主资源
struct HostSession(Box<dyn ModelSession>);

impl Drop for HostSession {
    fn drop(&mut self) {
        self.0.release();
        tracing::debug!("[ModelSessionGateway] Host session released");
    }
}

type SessionSlot = Arc<Mutex<Option<HostSession>>>;

/// 流式回复
///
/// 存活期间持有网关的实例锁，丢弃后其他请求才能继续
pub struct TextStream {
    inner: DeltaStream,
    _guard: OwnedMutexGuard<Option<HostSession>>,
}

impl Stream for TextStream {
    type Item = Result<String, GatewayError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .inner
            .as_mut()
            .poll_next(cx)
            .map(|item| item.map(|delta| delta.map_err(GatewayError::from_stream)))
    }
}

/// 模型会话网关
///
/// 管理宿主模型能力的生命周期：探测、创建、使用、销毁。
/// 同一时刻只有一个请求或流在使用宿主会话
pub struct ModelSessionGateway {
    capability: Option<Arc<dyn ModelCapability>>,
    options: SessionOptions,
    state: RwLock<GatewayState>,
    /// 最近一次初始化失败的原因
    last_error: RwLock<Option<GatewayError>>,
    session: SessionSlot,
}

impl ModelSessionGateway {
    /// 创建网关
    ///
    /// # Arguments
    /// * `capability` - 宿主模型能力，宿主不提供时为 None
    /// * `options` - 创建会话时使用的参数
    pub fn new(capability: Option<Arc<dyn ModelCapability>>, options: SessionOptions) -> Self {
        Self {
            capability,
            options,
            state: RwLock::new(GatewayState::Uninitialized),
            last_error: RwLock::new(None),
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn state(&self) -> GatewayState {
        *self.state.read().await
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    /// 检查会话可用，不可用时返回对应的错误
    ///
    /// 探测失败的网关返回当时的创建失败原因
    pub async fn ensure_ready(&self) -> Result<(), GatewayError> {
        match self.state().await {
            GatewayState::Ready => Ok(()),
            GatewayState::Unavailable => Err(self
                .last_error
                .read()
                .await
                .clone()
                .unwrap_or_else(|| {
                    GatewayError::CapabilityUnavailable("Unable to create AI session.".to_string())
                })),
            _ => Err(GatewayError::NotInitialized),
        }
    }

    /// 探测能力并创建会话
    ///
    /// 已就绪时直接返回；销毁后不再重新创建
    pub async fn initialize(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.state.write().await;
            match *state {
                GatewayState::Ready => return Ok(()),
                GatewayState::Destroyed => {
                    tracing::warn!("[ModelSessionGateway] Ignoring initialize after destroy");
                    return Err(GatewayError::NotInitialized);
                }
                _ => *state = GatewayState::Probing,
            }
        }

        match self.open_session().await {
            Ok(session) => {
                *self.session.lock().await = Some(HostSession(session));
                *self.last_error.write().await = None;
                *self.state.write().await = GatewayState::Ready;
                tracing::info!("[ModelSessionGateway] Model session ready");
                Ok(())
            }
            Err(e) => {
                *self.last_error.write().await = Some(e.clone());
                *self.state.write().await = GatewayState::Unavailable;
                tracing::error!("[ModelSessionGateway] Failed to create AI session: {}", e);
                Err(e)
            }
        }
    }

    async fn open_session(&self) -> Result<Box<dyn ModelSession>, GatewayError> {
        let capability = self.capability.as_ref().ok_or_else(|| {
            GatewayError::CapabilityUnavailable("model capability is not available".to_string())
        })?;

        let availability = capability
            .probe_availability()
            .await
            .map_err(|e| GatewayError::CapabilityUnavailable(e.to_string()))?;
        if availability != Availability::Readily {
            return Err(GatewayError::CapabilityUnavailable(
                "Unable to create AI session.".to_string(),
            ));
        }

        capability
            .create_session(self.options)
            .await
            .map_err(|e| GatewayError::CapabilityUnavailable(e.to_string()))
    }

    /// 单次请求
    pub async fn prompt(&self, text: &str) -> Result<String, GatewayError> {
        let slot = self.session.lock().await;
        let session = slot.as_ref().ok_or(GatewayError::NotInitialized)?;
        session.0.prompt(text).await.map_err(GatewayError::from_host)
    }

    /// 流式请求
    ///
    /// 返回的流按顺序产出增量，宿主关闭即结束
    pub async fn prompt_streaming(&self, text: &str) -> Result<TextStream, GatewayError> {
        let slot = self.session.clone().lock_owned().await;
        let inner = match slot.as_ref() {
            Some(session) => session
                .0
                .prompt_streaming(text)
                .await
                .map_err(GatewayError::from_host)?,
            None => return Err(GatewayError::NotInitialized),
        };

        Ok(TextStream {
            inner,
            _guard: slot,
        })
    }

    /// 释放宿主会话，可重复调用
    ///
    /// 有流在读取时等待其被丢弃
    pub async fn destroy(&self) {
        let released = self.session.lock().await.take();
        *self.state.write().await = GatewayState::Destroyed;
        if released.is_some() {
            tracing::info!("[ModelSessionGateway] Model session destroyed");
        }
    }
}
