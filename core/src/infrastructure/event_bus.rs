use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::modules::chat::domain::ChatDomainEvent;

/// 通知级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// 瞬时通知（由界面以 toast 形式展示）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "camelCase")]
pub enum AppEvent {
    Chat(ChatDomainEvent),
    Notification(Notification),
}

pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: AppEvent) {
        match &event {
            AppEvent::Chat(ChatDomainEvent::MessageStreamed(_)) => {
                tracing::trace!("[EventBus] Publishing event: {:?}", event);
            }
            AppEvent::Notification(Notification {
                level: NotificationLevel::Error,
                text,
            }) => {
                tracing::warn!("[EventBus] Error notification: {}", text);
            }
            _ => {
                tracing::debug!("[EventBus] Publishing event: {:?}", event);
            }
        }
        // 没有订阅者时发送失败，忽略即可
        let _ = self.sender.send(event);
    }

    pub fn chat(&self, event: ChatDomainEvent) {
        self.publish(AppEvent::Chat(event));
    }

    pub fn notify(&self, notification: Notification) {
        self.publish(AppEvent::Notification(notification));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
