use serde::{Deserialize, Serialize};

use super::super::value_objects::SessionId;
use super::{ChatMessage, ChatSession};

fn default_streaming() -> bool {
    true
}

/// 持久化形态
///
/// 与旧版存储保持一致：`activeChat` 存的是当前会话的完整快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub chat_sessions: Vec<ChatSession>,
    #[serde(default)]
    pub active_chat: Option<ChatSession>,
    #[serde(default = "default_streaming")]
    pub is_streaming: bool,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            chat_sessions: Vec::new(),
            active_chat: None,
            is_streaming: default_streaming(),
        }
    }
}

/// 聊天状态聚合根
///
/// 当前会话只记 ID，内容始终从 `sessions` 中取，不存在副本过期的问题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    sessions: Vec<ChatSession>,
    active_id: Option<SessionId>,
    is_streaming: bool,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            sessions: Vec::new(),
            active_id: None,
            is_streaming: default_streaming(),
        }
    }
}

impl ChatState {
    /// 从持久化快照恢复
    ///
    /// 只取快照里的 ID；指向不存在会话的快照会被丢弃
    pub fn from_persisted(persisted: PersistedState) -> Self {
        let active_id = persisted
            .active_chat
            .map(|chat| chat.id())
            .filter(|id| persisted.chat_sessions.iter().any(|s| s.id() == *id));

        Self {
            sessions: persisted.chat_sessions,
            active_id,
            is_streaming: persisted.is_streaming,
        }
    }

    /// 转为持久化快照
    pub fn to_persisted(&self) -> PersistedState {
        PersistedState {
            chat_sessions: self.sessions.clone(),
            active_chat: self.active().cloned(),
            is_streaming: self.is_streaming,
        }
    }

    // Getters
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn session(&self, id: SessionId) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active_id
    }

    pub fn active(&self) -> Option<&ChatSession> {
        self.active_id.and_then(|id| self.session(id))
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    fn session_mut(&mut self, id: SessionId) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    // 业务方法

    /// 新建会话并设为当前会话
    pub fn add_session(&mut self) -> ChatSession {
        let session = ChatSession::new(self.sessions.len() + 1);
        self.sessions.push(session.clone());
        self.active_id = Some(session.id());
        session
    }

    /// 删除会话；删除的是当前会话时清空指针。返回是否有会话被删除
    pub fn delete_session(&mut self, id: SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id() != id);
        if self.active_id == Some(id) {
            self.active_id = None;
        }
        self.sessions.len() != before
    }

    /// 清空所有会话，保留流式偏好
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.active_id = None;
    }

    /// 追加消息，会话不存在时返回 false
    pub fn append_message(&mut self, id: SessionId, message: ChatMessage) -> bool {
        match self.session_mut(id) {
            Some(session) => {
                session.push(message);
                true
            }
            None => false,
        }
    }

    /// 更新流式占位
    pub fn publish_partial(&mut self, id: SessionId, content: &str) -> bool {
        match self.session_mut(id) {
            Some(session) => {
                session.upsert_stream_slot(content);
                true
            }
            None => false,
        }
    }

    /// 定稿流式回合
    pub fn finalize_turn(&mut self, id: SessionId, message: ChatMessage) -> bool {
        match self.session_mut(id) {
            Some(session) => {
                session.settle(message);
                true
            }
            None => false,
        }
    }

    /// 切换当前会话，找不到时清空
    pub fn set_active(&mut self, id: SessionId) -> bool {
        let found = self.session(id).is_some();
        self.active_id = found.then_some(id);
        found
    }

    pub fn set_streaming(&mut self, is_streaming: bool) {
        self.is_streaming = is_streaming;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_session_sets_active_and_title() {
        let mut state = ChatState::default();
        let first = state.add_session();
        let second = state.add_session();

        assert_eq!(first.title(), "Chat 1");
        assert_eq!(second.title(), "Chat 2");
        assert_eq!(state.active_id(), Some(second.id()));
        assert!(state.is_streaming());
    }

    #[test]
    fn test_delete_active_clears_pointer() {
        let mut state = ChatState::default();
        let first = state.add_session();
        let second = state.add_session();

        assert!(state.delete_session(first.id()));
        assert_eq!(state.active_id(), Some(second.id()));

        assert!(state.delete_session(second.id()));
        assert_eq!(state.active_id(), None);

        // 不存在的 ID 不报错
        assert!(!state.delete_session(second.id()));
    }

    #[test]
    fn test_active_view_tracks_live_entry() {
        let mut state = ChatState::default();
        let first = state.add_session();
        state.set_active(first.id());
        state.add_session();
        state.set_active(first.id());

        state.append_message(first.id(), ChatMessage::user("hello"));
        assert_eq!(state.active().unwrap().history().len(), 1);
    }

    #[test]
    fn test_set_active_unknown_clears() {
        let mut state = ChatState::default();
        state.add_session();
        assert!(!state.set_active(SessionId::generate()));
        assert!(state.active().is_none());
    }

    #[test]
    fn test_hydrate_drops_dangling_active() {
        let mut state = ChatState::default();
        let kept = state.add_session();
        let orphan = ChatSession::new(9);

        let persisted = PersistedState {
            chat_sessions: vec![kept.clone()],
            active_chat: Some(orphan),
            is_streaming: false,
        };
        let restored = ChatState::from_persisted(persisted);
        assert_eq!(restored.active_id(), None);
        assert!(!restored.is_streaming());
        assert_eq!(restored.sessions().len(), 1);
    }

    #[test]
    fn test_persisted_defaults_for_missing_keys() {
        let persisted: PersistedState = serde_json::from_str("{}").unwrap();
        assert!(persisted.is_streaming);
        assert!(persisted.chat_sessions.is_empty());
        assert!(persisted.active_chat.is_none());
    }
}
