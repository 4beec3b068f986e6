use serde::{Deserialize, Serialize};

use super::super::value_objects::SessionId;
use super::ChatMessage;

/// 聊天会话
///
/// 有序的对话记录；历史只追加，流式占位除外
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// 会话唯一标识
    id: SessionId,
    /// 会话标题，创建后不会自动改名
    title: String,
    /// 按时间顺序排列的消息
    #[serde(default)]
    history: Vec<ChatMessage>,
}

impl ChatSession {
    /// 创建空会话，标题为 "Chat {position}"
    pub fn new(position: usize) -> Self {
        Self {
            id: SessionId::generate(),
            title: format!("Chat {}", position),
            history: Vec::new(),
        }
    }

    // Getters
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.history.last()
    }

    // 业务方法

    /// 追加消息
    pub fn push(&mut self, message: ChatMessage) {
        self.history.push(message);
    }

    /// 更新流式占位：末尾是未定稿的助手消息则替换其内容，否则追加新占位
    pub fn upsert_stream_slot(&mut self, content: &str) {
        match self.history.last_mut() {
            Some(last) if last.is_open_stream_slot() => last.replace_content(content),
            _ => self.history.push(ChatMessage::streaming(content)),
        }
    }

    /// 定稿：替换末尾的流式占位，没有占位时直接追加
    pub fn settle(&mut self, message: ChatMessage) {
        match self.history.last_mut() {
            Some(last) if last.is_open_stream_slot() => *last = message,
            _ => self.history.push(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_title() {
        let session = ChatSession::new(3);
        assert_eq!(session.title(), "Chat 3");
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_stream_slot_is_replaced_not_appended() {
        let mut session = ChatSession::new(1);
        session.push(ChatMessage::user("hi"));

        session.upsert_stream_slot("Hel");
        session.upsert_stream_slot("Hello");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[1].message(), "Hello");
        assert!(session.history()[1].is_loading());

        session.settle(ChatMessage::assistant("Hello!"));
        assert_eq!(session.history().len(), 2);
        assert!(!session.history()[1].is_loading());

        // 已定稿后再开新占位
        session.upsert_stream_slot("Next");
        assert_eq!(session.history().len(), 3);
    }

    #[test]
    fn test_settle_without_slot_appends() {
        let mut session = ChatSession::new(1);
        session.push(ChatMessage::user("hi"));
        session.settle(ChatMessage::assistant("reply"));
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.last_message().unwrap().message(), "reply");
    }

    #[test]
    fn test_user_message_is_never_a_slot() {
        let mut session = ChatSession::new(1);
        // 即使外部数据把用户消息标成 loading，也不会被当成占位
        let user: ChatMessage = serde_json::from_value(serde_json::json!({
            "message": "typing",
            "fromUser": true,
            "loading": true
        }))
        .unwrap();
        session.push(user);
        session.upsert_stream_slot("reply");
        assert_eq!(session.history().len(), 2);
    }
}
