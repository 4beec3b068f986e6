use chrono::Utc;
use serde::{Deserialize, Serialize};

/// 聊天消息
///
/// 追加到历史后即不可变；唯一例外是流式回合中 `loading=true` 的那一条，
/// 会被反复替换，最后以 `loading=false` 定稿
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// 消息正文（可渲染的文本或 HTML）
    message: String,
    /// 是否来自用户
    from_user: bool,
    /// 是否仍在生成中
    #[serde(default, skip_serializing_if = "Option::is_none")]
    loading: Option<bool>,
    /// 创建时间（毫秒时间戳）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
}

impl ChatMessage {
    fn build(message: impl Into<String>, from_user: bool, loading: bool) -> Self {
        Self {
            message: message.into(),
            from_user,
            loading: Some(loading),
            timestamp: Some(Utc::now().timestamp_millis()),
        }
    }

    /// 创建用户消息
    pub fn user(message: impl Into<String>) -> Self {
        Self::build(message, true, false)
    }

    /// 创建已完成的助手消息
    pub fn assistant(message: impl Into<String>) -> Self {
        Self::build(message, false, false)
    }

    /// 创建生成中的助手消息（流式回合的占位）
    pub fn streaming(message: impl Into<String>) -> Self {
        Self::build(message, false, true)
    }

    // Getters
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn from_user(&self) -> bool {
        self.from_user
    }

    pub fn loading(&self) -> Option<bool> {
        self.loading
    }

    pub fn is_loading(&self) -> bool {
        self.loading.unwrap_or(false)
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// 是否为尚未定稿的流式占位
    pub fn is_open_stream_slot(&self) -> bool {
        !self.from_user && self.is_loading()
    }

    /// 替换占位内容（仅用于流式回合）
    pub(crate) fn replace_content(&mut self, content: &str) {
        self.message.clear();
        self.message.push_str(content);
    }
}
