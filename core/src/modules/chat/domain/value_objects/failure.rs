use serde::{Deserialize, Serialize};
use std::fmt;

/// 失败类别
///
/// 在失败产生处（网关、版本探测）直接标注，不再从错误文本里反推
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// 宿主未提供模型能力，或能力尚未就绪
    CapabilityUnavailable,
    /// 模型会话尚未创建就发起了请求
    SessionUninitialized,
    /// 宿主主版本低于要求
    VersionTooLow,
    /// 流式读取中途失败
    StreamReadFailure,
    /// 宿主报告的网络问题
    Network,
    /// 宿主报告的凭据问题
    Credentials,
    /// 兜底
    Unknown,
}

impl FailureKind {
    /// 从自由文本推断类别
    ///
    /// 有序匹配，先命中者为准；只用于没有结构化类别的宿主错误文本
    pub fn infer(description: &str) -> Self {
        if description.contains("AI session creation failed") {
            FailureKind::CapabilityUnavailable
        } else if description.contains("network") {
            FailureKind::Network
        } else if description.contains("API key") {
            FailureKind::Credentials
        } else if description.contains("Chrome version") {
            FailureKind::VersionTooLow
        } else {
            FailureKind::Unknown
        }
    }
}

/// 一次对话回合的失败描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl ChatFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// 从文本构造，类别由文本推断
    pub fn from_description(description: impl Into<String>) -> Self {
        let detail = description.into();
        Self {
            kind: FailureKind::infer(&detail),
            detail,
        }
    }
}

impl fmt::Display for ChatFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.detail)
    }
}
