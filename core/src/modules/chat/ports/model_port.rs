use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use thiserror::Error;

/// 宿主模型错误
///
/// 宿主不区分网络、配额或兼容性错误，统一以文本上报
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("{0}")]
    Host(String),

    #[error("Model session has been released")]
    Released,
}

/// 能力可用性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// 不可用（旧版本宿主，或模型未下载完）
    #[serde(alias = "no")]
    Unavailable,
    /// 可立即创建会话
    Readily,
}

/// 创建模型会话的参数
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl SessionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }
}

/// 流式响应：按顺序产出文本增量，宿主关闭流即表示结束
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, ModelError>> + Send>>;

/// 宿主模型能力端口
#[async_trait]
pub trait ModelCapability: Send + Sync {
    /// 探测是否可以创建会话
    async fn probe_availability(&self) -> Result<Availability, ModelError>;

    /// 创建模型会话
    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> Result<Box<dyn ModelSession>, ModelError>;
}

/// 宿主模型会话端口
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// 单次请求，返回完整回复
    async fn prompt(&self, text: &str) -> Result<String, ModelError>;

    /// 流式请求
    async fn prompt_streaming(&self, text: &str) -> Result<DeltaStream, ModelError>;

    /// 释放宿主资源
    fn release(&self);
}
