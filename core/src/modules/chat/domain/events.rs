use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_objects::{FailureKind, SessionId};

/// 领域事件基础 trait
pub trait DomainEvent: Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
    fn timestamp(&self) -> DateTime<Utc>;
}

/// 会话创建事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreatedEvent {
    pub session_id: SessionId,
    pub title: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionCreatedEvent {
    fn event_type(&self) -> &'static str {
        "session.created"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 会话删除事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDeletedEvent {
    pub session_id: SessionId,
    pub was_active: bool,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionDeletedEvent {
    fn event_type(&self) -> &'static str {
        "session.deleted"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 全部会话清空事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsClearedEvent {
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for SessionsClearedEvent {
    fn event_type(&self) -> &'static str {
        "session.cleared"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 消息追加事件（含流式回合的定稿）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAppendedEvent {
    pub session_id: SessionId,
    pub from_user: bool,
    pub history_len: usize,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for MessageAppendedEvent {
    fn event_type(&self) -> &'static str {
        "message.appended"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 流式占位更新事件，`content` 是截至目前的完整累积文本
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStreamedEvent {
    pub session_id: SessionId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for MessageStreamedEvent {
    fn event_type(&self) -> &'static str {
        "message.streamed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 流式偏好变更事件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingPreferenceChangedEvent {
    pub is_streaming: bool,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StreamingPreferenceChangedEvent {
    fn event_type(&self) -> &'static str {
        "preference.streaming"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 对话回合结束事件：无论成败都会发出，界面据此清空输入框和加载状态
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnSettledEvent {
    pub session_id: SessionId,
    pub failure: Option<FailureKind>,
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for TurnSettledEvent {
    fn event_type(&self) -> &'static str {
        "turn.settled"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// 聊天领域事件枚举
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatDomainEvent {
    SessionCreated(SessionCreatedEvent),
    SessionDeleted(SessionDeletedEvent),
    SessionsCleared(SessionsClearedEvent),
    MessageAppended(MessageAppendedEvent),
    MessageStreamed(MessageStreamedEvent),
    StreamingPreferenceChanged(StreamingPreferenceChangedEvent),
    TurnSettled(TurnSettledEvent),
}

impl ChatDomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatDomainEvent::SessionCreated(e) => e.event_type(),
            ChatDomainEvent::SessionDeleted(e) => e.event_type(),
            ChatDomainEvent::SessionsCleared(e) => e.event_type(),
            ChatDomainEvent::MessageAppended(e) => e.event_type(),
            ChatDomainEvent::MessageStreamed(e) => e.event_type(),
            ChatDomainEvent::StreamingPreferenceChanged(e) => e.event_type(),
            ChatDomainEvent::TurnSettled(e) => e.event_type(),
        }
    }

    /// 事件所属会话（全局事件返回 None）
    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            ChatDomainEvent::SessionCreated(e) => Some(e.session_id),
            ChatDomainEvent::SessionDeleted(e) => Some(e.session_id),
            ChatDomainEvent::MessageAppended(e) => Some(e.session_id),
            ChatDomainEvent::MessageStreamed(e) => Some(e.session_id),
            ChatDomainEvent::TurnSettled(e) => Some(e.session_id),
            ChatDomainEvent::SessionsCleared(_)
            | ChatDomainEvent::StreamingPreferenceChanged(_) => None,
        }
    }
}
