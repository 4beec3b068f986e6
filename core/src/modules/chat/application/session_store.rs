use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::infrastructure::EventBus;
use crate::modules::chat::domain::{
    ChatDomainEvent, ChatMessage, ChatSession, ChatState, MessageAppendedEvent,
    MessageStreamedEvent, PersistedState, SessionCreatedEvent, SessionDeletedEvent, SessionId,
    SessionsClearedEvent, StreamingPreferenceChangedEvent,
};
use crate::modules::chat::ports::{RepositoryError, StateStorage};

/// 会话状态存储
///
/// 内存中的权威状态。每次变更后把整个聚合序列化写回存储；
/// 写锁覆盖变更和写入两步，因此落盘顺序与变更顺序一致。
/// 写入失败时内存状态保持不变。
/// 会话 ID 不存在时静默忽略，只有存储失败才返回错误。
pub struct SessionStore {
    state: RwLock<ChatState>,
    storage: Arc<dyn StateStorage>,
    storage_key: String,
    event_bus: Option<Arc<EventBus>>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn StateStorage>, storage_key: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(ChatState::default()),
            storage,
            storage_key: storage_key.into(),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// 没有已保存状态时使用的流式偏好
    pub fn with_streaming_default(mut self, is_streaming: bool) -> Self {
        self.state.get_mut().set_streaming(is_streaming);
        self
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// 从存储恢复状态
    ///
    /// 快照整体替换当前状态。读不到或内容损坏时记录日志并保留默认状态，返回是否恢复成功
    pub async fn hydrate(&self) -> bool {
        let blob = match self.storage.load(&self.storage_key).await {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                tracing::debug!("[SessionStore] No saved state under '{}'", self.storage_key);
                return false;
            }
            Err(e) => {
                tracing::warn!("[SessionStore] Failed to read saved state: {}", e);
                return false;
            }
        };

        match serde_json::from_str::<PersistedState>(&blob) {
            Ok(persisted) => {
                let restored = ChatState::from_persisted(persisted);
                tracing::info!(
                    "[SessionStore] Restored {} sessions (active: {:?})",
                    restored.sessions().len(),
                    restored.active_id()
                );
                *self.state.write().await = restored;
                true
            }
            Err(e) => {
                tracing::warn!("[SessionStore] Ignoring corrupt saved state: {}", e);
                false
            }
        }
    }

    async fn persist(&self, state: &ChatState) -> Result<(), RepositoryError> {
        let blob = serde_json::to_string(&state.to_persisted())?;
        self.storage.save(&self.storage_key, &blob).await
    }

    /// 在副本上变更并写回，写入成功后才替换内存状态
    ///
    /// 返回的写锁让调用方在同一临界区内发布事件
    async fn commit<T>(
        &self,
        mutate: impl FnOnce(&mut ChatState) -> T,
    ) -> Result<(T, RwLockWriteGuard<'_, ChatState>), RepositoryError> {
        let mut state = self.state.write().await;
        let mut next = state.clone();
        let outcome = mutate(&mut next);
        self.persist(&next).await?;
        *state = next;
        Ok((outcome, state))
    }

    fn publish(&self, event: ChatDomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.chat(event);
        }
    }

    // Commands

    /// 新建会话并设为当前会话
    pub async fn add_session(&self) -> Result<ChatSession, RepositoryError> {
        let (session, _state) = self.commit(|state| state.add_session()).await?;

        tracing::info!("[SessionStore] Created session {} ({})", session.id(), session.title());
        self.publish(ChatDomainEvent::SessionCreated(SessionCreatedEvent {
            session_id: session.id(),
            title: session.title().to_string(),
            timestamp: Utc::now(),
        }));
        Ok(session)
    }

    /// 删除会话；删除当前会话时清空指针。返回是否有会话被删除
    pub async fn delete_session(&self, id: SessionId) -> Result<bool, RepositoryError> {
        let ((removed, was_active), _state) = self
            .commit(|state| {
                let was_active = state.active_id() == Some(id);
                (state.delete_session(id), was_active)
            })
            .await?;

        if removed {
            tracing::info!("[SessionStore] Deleted session {}", id);
            self.publish(ChatDomainEvent::SessionDeleted(SessionDeletedEvent {
                session_id: id,
                was_active,
                timestamp: Utc::now(),
            }));
        }
        Ok(removed)
    }

    /// 清空所有会话，保留流式偏好
    pub async fn clear_all_sessions(&self) -> Result<(), RepositoryError> {
        let (_, _state) = self.commit(|state| state.clear()).await?;

        tracing::info!("[SessionStore] Cleared all sessions");
        self.publish(ChatDomainEvent::SessionsCleared(SessionsClearedEvent {
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// 追加消息。返回会话是否存在
    pub async fn append_message(
        &self,
        id: SessionId,
        message: ChatMessage,
    ) -> Result<bool, RepositoryError> {
        let from_user = message.from_user();
        let (appended, state) = self
            .commit(|state| state.append_message(id, message))
            .await?;

        if appended {
            self.publish(ChatDomainEvent::MessageAppended(MessageAppendedEvent {
                session_id: id,
                from_user,
                history_len: state.session(id).map_or(0, |s| s.history().len()),
                timestamp: Utc::now(),
            }));
        }
        Ok(appended)
    }

    /// 用累积文本更新本回合的流式占位
    pub async fn publish_partial(
        &self,
        id: SessionId,
        content: &str,
    ) -> Result<bool, RepositoryError> {
        let (updated, _state) = self
            .commit(|state| state.publish_partial(id, content))
            .await?;

        if updated {
            self.publish(ChatDomainEvent::MessageStreamed(MessageStreamedEvent {
                session_id: id,
                content: content.to_string(),
                timestamp: Utc::now(),
            }));
        }
        Ok(updated)
    }

    /// 定稿本回合：替换末尾的流式占位，没有占位时追加
    pub async fn finalize_turn(
        &self,
        id: SessionId,
        message: ChatMessage,
    ) -> Result<bool, RepositoryError> {
        let from_user = message.from_user();
        let (settled, state) = self
            .commit(|state| state.finalize_turn(id, message))
            .await?;

        if settled {
            self.publish(ChatDomainEvent::MessageAppended(MessageAppendedEvent {
                session_id: id,
                from_user,
                history_len: state.session(id).map_or(0, |s| s.history().len()),
                timestamp: Utc::now(),
            }));
        }
        Ok(settled)
    }

    /// 切换当前会话，找不到时清空指针
    ///
    /// 不立即写回，下一次变更会一并保存
    pub async fn set_active(&self, id: SessionId) -> bool {
        let mut state = self.state.write().await;
        state.set_active(id)
    }

    pub async fn set_streaming_preference(&self, is_streaming: bool) -> Result<(), RepositoryError> {
        let (_, _state) = self
            .commit(|state| state.set_streaming(is_streaming))
            .await?;

        self.publish(ChatDomainEvent::StreamingPreferenceChanged(
            StreamingPreferenceChangedEvent {
                is_streaming,
                timestamp: Utc::now(),
            },
        ));
        Ok(())
    }

    // Queries

    pub async fn sessions(&self) -> Vec<ChatSession> {
        self.state.read().await.sessions().to_vec()
    }

    pub async fn session(&self, id: SessionId) -> Option<ChatSession> {
        self.state.read().await.session(id).cloned()
    }

    /// 当前会话的最新内容
    pub async fn active_chat(&self) -> Option<ChatSession> {
        self.state.read().await.active().cloned()
    }

    pub async fn active_id(&self) -> Option<SessionId> {
        self.state.read().await.active_id()
    }

    pub async fn is_streaming(&self) -> bool {
        self.state.read().await.is_streaming()
    }

    /// 持久化形态的快照
    pub async fn snapshot(&self) -> PersistedState {
        self.state.read().await.to_persisted()
    }

    /// 与写入存储完全相同的序列化结果
    pub async fn serialize(&self) -> Result<String, RepositoryError> {
        let snapshot = self.snapshot().await;
        Ok(serde_json::to_string(&snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::AppEvent;
    use crate::modules::chat::infrastructure::InMemoryStateStorage;
    use std::collections::HashSet;

    const KEY: &str = "geminiNanoChatSessions";

    fn store_with(storage: Arc<InMemoryStateStorage>) -> SessionStore {
        SessionStore::new(storage, KEY)
    }

    #[tokio::test]
    async fn test_add_session_ids_are_unique() {
        let store = store_with(Arc::new(InMemoryStateStorage::new()));

        let mut ids = HashSet::new();
        for n in 1..=20 {
            let session = store.add_session().await.unwrap();
            assert_eq!(session.title(), format!("Chat {}", n));
            assert!(ids.insert(session.id()));
        }
        assert_eq!(store.sessions().await.len(), 20);
    }

    #[tokio::test]
    async fn test_add_session_becomes_active() {
        let store = store_with(Arc::new(InMemoryStateStorage::new()));
        let first = store.add_session().await.unwrap();
        let second = store.add_session().await.unwrap();

        assert_eq!(store.active_id().await, Some(second.id()));
        assert!(store.set_active(first.id()).await);
        assert_eq!(store.active_chat().await.unwrap().id(), first.id());
    }

    #[tokio::test]
    async fn test_every_mutation_writes_through() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());

        let session = store.add_session().await.unwrap();
        store
            .append_message(session.id(), ChatMessage::user("hi"))
            .await
            .unwrap();
        store.set_streaming_preference(false).await.unwrap();
        assert_eq!(storage.write_count(), 3);

        // 切换当前会话不写回
        store.set_active(session.id()).await;
        assert_eq!(storage.write_count(), 3);

        let blob = storage.load(KEY).await.unwrap().unwrap();
        assert_eq!(blob, store.serialize().await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_noops_but_persist() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());
        let ghost = SessionId::generate();

        assert!(!store.delete_session(ghost).await.unwrap());
        assert!(!store
            .append_message(ghost, ChatMessage::user("lost"))
            .await
            .unwrap());
        assert!(!store.set_active(ghost).await);

        assert!(store.sessions().await.is_empty());
        assert_eq!(storage.write_count(), 2);
    }

    #[tokio::test]
    async fn test_delete_active_clears_pointer() {
        let store = store_with(Arc::new(InMemoryStateStorage::new()));
        let first = store.add_session().await.unwrap();
        let second = store.add_session().await.unwrap();

        assert!(store.delete_session(first.id()).await.unwrap());
        assert_eq!(store.active_id().await, Some(second.id()));

        assert!(store.delete_session(second.id()).await.unwrap());
        assert_eq!(store.active_id().await, None);
        assert!(store.active_chat().await.is_none());
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = store_with(Arc::new(InMemoryStateStorage::new()));
        let session = store.add_session().await.unwrap();

        for text in ["one", "two", "three"] {
            store
                .append_message(session.id(), ChatMessage::user(text))
                .await
                .unwrap();
        }

        let history: Vec<String> = store
            .active_chat()
            .await
            .unwrap()
            .history()
            .iter()
            .map(|m| m.message().to_string())
            .collect();
        assert_eq!(history, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent_and_keeps_preference() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());
        store.add_session().await.unwrap();
        store.set_streaming_preference(false).await.unwrap();

        store.clear_all_sessions().await.unwrap();
        let once = store.snapshot().await;
        store.clear_all_sessions().await.unwrap();
        let twice = store.snapshot().await;

        assert_eq!(once, twice);
        assert!(once.chat_sessions.is_empty());
        assert!(once.active_chat.is_none());
        assert!(!once.is_streaming);
    }

    #[tokio::test]
    async fn test_streaming_slot_is_replaced_then_finalized() {
        let store = store_with(Arc::new(InMemoryStateStorage::new()));
        let session = store.add_session().await.unwrap();
        store
            .append_message(session.id(), ChatMessage::user("hello"))
            .await
            .unwrap();

        store.publish_partial(session.id(), "Hel").await.unwrap();
        store.publish_partial(session.id(), "Hello").await.unwrap();
        let during = store.session(session.id()).await.unwrap();
        assert_eq!(during.history().len(), 2);
        assert!(during.history()[1].is_loading());

        store
            .finalize_turn(session.id(), ChatMessage::assistant("Hello"))
            .await
            .unwrap();
        let after = store.session(session.id()).await.unwrap();
        assert_eq!(after.history().len(), 2);
        assert_eq!(after.history()[1].message(), "Hello");
        assert_eq!(after.history()[1].loading(), Some(false));
    }

    #[tokio::test]
    async fn test_round_trip_through_storage() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());
        let first = store.add_session().await.unwrap();
        store.add_session().await.unwrap();
        store
            .append_message(first.id(), ChatMessage::user("persist me"))
            .await
            .unwrap();
        store.set_streaming_preference(false).await.unwrap();

        let restored = store_with(storage);
        assert!(restored.hydrate().await);

        let before = store.snapshot().await;
        let after = restored.snapshot().await;
        assert_eq!(before.chat_sessions, after.chat_sessions);
        assert_eq!(before.is_streaming, after.is_streaming);
        assert_eq!(restored.active_id().await, store.active_id().await);
    }

    #[tokio::test]
    async fn test_hydrate_ignores_corrupt_blob() {
        let storage = Arc::new(InMemoryStateStorage::with_entry(KEY, "{not json"));
        let store = store_with(storage).with_streaming_default(false);

        assert!(!store.hydrate().await);
        assert!(store.sessions().await.is_empty());
        assert!(!store.is_streaming().await);
    }

    #[tokio::test]
    async fn test_hydrate_drops_dangling_active() {
        let stray = ChatSession::new(9);
        let blob = serde_json::json!({
            "chatSessions": [],
            "activeChat": stray,
            "isStreaming": true,
        })
        .to_string();
        let store = store_with(Arc::new(InMemoryStateStorage::with_entry(KEY, blob)));

        assert!(store.hydrate().await);
        assert!(store.active_chat().await.is_none());
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());
        storage.set_fail_writes(true);

        let result = store.add_session().await;
        assert!(matches!(result, Err(RepositoryError::StorageError(_))));
        assert!(store.sessions().await.is_empty());
        assert_eq!(store.active_id().await, None);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_unchanged() {
        let storage = Arc::new(InMemoryStateStorage::new());
        let store = store_with(storage.clone());
        let first = store.add_session().await.unwrap();
        let second = store.add_session().await.unwrap();
        store
            .append_message(second.id(), ChatMessage::user("kept"))
            .await
            .unwrap();
        let before = store.snapshot().await;

        storage.set_fail_writes(true);
        assert!(store.delete_session(second.id()).await.is_err());
        assert!(store
            .append_message(second.id(), ChatMessage::user("lost"))
            .await
            .is_err());
        assert!(store.publish_partial(second.id(), "Hel").await.is_err());
        assert!(store.set_streaming_preference(false).await.is_err());
        assert!(store.clear_all_sessions().await.is_err());

        assert_eq!(store.snapshot().await, before);
        assert_eq!(store.active_id().await, Some(second.id()));
        assert!(store.session(first.id()).await.is_some());

        // 内存与存储一致
        storage.set_fail_writes(false);
        let blob = storage.load(KEY).await.unwrap().unwrap();
        assert_eq!(blob, store.serialize().await.unwrap());
    }

    #[tokio::test]
    async fn test_mutations_publish_events() {
        let bus = Arc::new(EventBus::new());
        let mut rx = bus.subscribe();
        let store = store_with(Arc::new(InMemoryStateStorage::new())).with_event_bus(bus);

        let session = store.add_session().await.unwrap();
        store.publish_partial(session.id(), "Hel").await.unwrap();

        let kinds: Vec<&'static str> = [rx.recv().await.unwrap(), rx.recv().await.unwrap()]
            .iter()
            .map(|e| match e {
                AppEvent::Chat(event) => event.event_type(),
                AppEvent::Notification(_) => "notification",
            })
            .collect();
        assert_eq!(kinds, vec!["session.created", "message.streamed"]);
    }
}
