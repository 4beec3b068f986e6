use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use super::super::{
    cancelled, ApplicationError, CommandHandler, ModelSessionGateway, ReduceError,
    SessionStore, StreamReducer,
};
use crate::infrastructure::{EventBus, Notification};
use crate::modules::chat::domain::{
    ChatDomainEvent, ChatFailure, ChatMessage, ErrorClassifier, FailureKind, SessionId,
    TurnSettledEvent,
};
use crate::modules::chat::ports::RepositoryError;
use crate::shared::BrowserVersion;

/// 单条消息的最大字符数
pub const MAX_MESSAGE_LENGTH: usize = 5000;

/// 发送消息命令
#[derive(Debug, Clone)]
pub struct SendMessageCommand {
    /// 用户消息内容
    pub content: String,
    /// 目标会话，缺省为当前会话
    pub session_id: Option<SessionId>,
    /// 取消信号，置为 true 时停止读取流
    pub cancel: Option<watch::Receiver<bool>>,
}

impl SendMessageCommand {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            session_id: None,
            cancel: None,
        }
    }

    pub fn for_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// 回合结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TurnOutcome {
    /// 回复已写入对话
    Completed { reply: String },
    /// 失败说明已写入对话
    Failed { failure: ChatFailure },
    /// 被取消，已收到的部分保留
    Cancelled { partial: String },
}

/// 发送消息响应
#[derive(Debug, Clone)]
pub struct SendMessageResponse {
    /// 实际写入的会话
    pub session_id: SessionId,
    /// 用户消息
    pub user_message: ChatMessage,
    /// 是否以流式方式请求
    pub streamed: bool,
    pub outcome: TurnOutcome,
}

/// 发送消息命令处理器
///
/// 唯一调用模型的地方。模型侧的失败都会转成对话中的说明和一条错误通知，
/// 只有存储失败会作为错误返回
pub struct SendMessageHandler {
    store: Arc<SessionStore>,
    gateway: Arc<ModelSessionGateway>,
    classifier: ErrorClassifier,
    browser: Option<BrowserVersion>,
    event_bus: Option<Arc<EventBus>>,
    /// 每个会话一把锁，同一会话的发送按到达顺序执行
    in_flight: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    /// 模块关闭信号，所有进行中的回合一起取消
    shutdown: watch::Sender<bool>,
}

impl SendMessageHandler {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<ModelSessionGateway>,
        classifier: ErrorClassifier,
    ) -> Self {
        Self {
            store,
            gateway,
            classifier,
            browser: None,
            event_bus: None,
            in_flight: Mutex::new(HashMap::new()),
            shutdown: watch::channel(false).0,
        }
    }

    pub fn with_browser(mut self, browser: Option<BrowserVersion>) -> Self {
        self.browser = browser;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// 取消所有进行中的回合
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
        tracing::info!("[SendMessageHandler] Shutdown requested, cancelling turns in flight");
    }

    /// 合并命令自带的取消信号和关闭信号
    fn turn_cancel(&self, requested: Option<watch::Receiver<bool>>) -> watch::Receiver<bool> {
        let mut shutdown = self.shutdown.subscribe();
        let Some(mut requested) = requested else {
            return shutdown;
        };

        let already = *shutdown.borrow() || *requested.borrow();
        let (tx, rx) = watch::channel(already);
        if !already {
            tokio::spawn(async move {
                tokio::select! {
                    _ = cancelled(&mut shutdown) => {}
                    _ = cancelled(&mut requested) => {}
                    _ = tx.closed() => return,
                }
                let _ = tx.send(true);
            });
        }
        rx
    }

    fn notify(&self, notification: Notification) {
        if let Some(bus) = &self.event_bus {
            bus.notify(notification);
        }
    }

    fn settle(&self, session_id: SessionId, failure: Option<FailureKind>) {
        if let Some(bus) = &self.event_bus {
            bus.chat(ChatDomainEvent::TurnSettled(TurnSettledEvent {
                session_id,
                failure,
                timestamp: Utc::now(),
            }));
        }
    }

    /// 确定目标会话；没有当前会话时新建一个
    async fn resolve_session(
        &self,
        requested: Option<SessionId>,
    ) -> Result<SessionId, ApplicationError> {
        if let Some(id) = requested {
            return match self.store.session(id).await {
                Some(_) => Ok(id),
                None => Err(ApplicationError::SessionNotFound(id.to_string())),
            };
        }

        if let Some(id) = self.store.active_id().await {
            return Ok(id);
        }

        tracing::warn!("[SendMessageHandler] No active chat session. Creating a new one.");
        let session = self.store.add_session().await?;
        Ok(session.id())
    }

    async fn turn_lock(&self, session_id: SessionId) -> Arc<Mutex<()>> {
        let mut locks = self.in_flight.lock().await;
        locks.entry(session_id).or_default().clone()
    }

    /// 没有其他发送在等待时移除该会话的锁
    async fn release_turn_lock(&self, session_id: SessionId, lock: Arc<Mutex<()>>) {
        let mut locks = self.in_flight.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&session_id);
        }
    }

    #[cfg(test)]
    async fn tracked_sessions(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// 执行一个回合：前置检查、请求模型、写回结果
    async fn run_turn(
        &self,
        session_id: SessionId,
        content: &str,
        streamed: bool,
        cancel: watch::Receiver<bool>,
    ) -> Result<TurnOutcome, RepositoryError> {
        if let Err(e) = self.gateway.ensure_ready().await {
            return self.fail(session_id, e.to_failure()).await;
        }

        if let Some(version) = self.browser {
            let min_major = self.classifier.min_major();
            if !version.meets_minimum(min_major) {
                let failure = ChatFailure::new(
                    FailureKind::VersionTooLow,
                    format!("Chrome version {} or higher is required.", min_major),
                );
                return self.fail(session_id, failure).await;
            }
        }

        if streamed {
            self.run_streaming(session_id, content, cancel).await
        } else {
            self.run_single(session_id, content, cancel).await
        }
    }

    async fn run_single(
        &self,
        session_id: SessionId,
        content: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<TurnOutcome, RepositoryError> {
        let reply = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                return Ok(TurnOutcome::Cancelled { partial: String::new() });
            }
            reply = self.gateway.prompt(content) => reply,
        };

        match reply {
            Ok(reply) => {
                self.store
                    .append_message(session_id, ChatMessage::assistant(reply.clone()))
                    .await?;
                Ok(TurnOutcome::Completed { reply })
            }
            Err(e) => self.fail(session_id, e.to_failure()).await,
        }
    }

    async fn run_streaming(
        &self,
        session_id: SessionId,
        content: &str,
        cancel: watch::Receiver<bool>,
    ) -> Result<TurnOutcome, RepositoryError> {
        let deltas = match self.gateway.prompt_streaming(content).await {
            Ok(deltas) => deltas,
            Err(e) => return self.fail(session_id, e.to_failure()).await,
        };

        let reducer = StreamReducer::new(self.store.clone(), session_id);
        match reducer.reduce(deltas, cancel).await {
            Ok(reply) => {
                self.store
                    .finalize_turn(session_id, ChatMessage::assistant(reply.clone()))
                    .await?;
                Ok(TurnOutcome::Completed { reply })
            }
            Err(ReduceError::Read { partial, source }) => {
                self.close_partial(session_id, &partial).await?;
                self.notify(Notification::error("Error reading stream."));
                self.fail(session_id, source.to_failure()).await
            }
            Err(ReduceError::Cancelled { partial }) => {
                self.close_partial(session_id, &partial).await?;
                Ok(TurnOutcome::Cancelled { partial })
            }
            Err(ReduceError::Store(e)) => Err(e),
        }
    }

    /// 持有会话锁后执行的部分：写入用户消息、跑完回合、发布结果
    async fn send_in_session(
        &self,
        session_id: SessionId,
        command: SendMessageCommand,
    ) -> Result<SendMessageResponse, ApplicationError> {
        let user_message = ChatMessage::user(command.content.clone());
        let streamed = self.store.is_streaming().await;
        let cancel = self.turn_cancel(command.cancel);

        tracing::info!(
            "[SendMessageHandler] Sending message to {} (streaming: {})",
            session_id,
            streamed
        );

        let result = match self
            .store
            .append_message(session_id, user_message.clone())
            .await
        {
            Ok(_) => {
                self.run_turn(session_id, &command.content, streamed, cancel)
                    .await
            }
            Err(e) => Err(e),
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.settle(session_id, Some(FailureKind::Unknown));
                return Err(e.into());
            }
        };

        match &outcome {
            TurnOutcome::Completed { .. } => {
                self.notify(Notification::success("Message sent successfully."));
                self.settle(session_id, None);
            }
            TurnOutcome::Failed { failure } => self.settle(session_id, Some(failure.kind)),
            TurnOutcome::Cancelled { .. } => self.settle(session_id, None),
        }

        Ok(SendMessageResponse {
            session_id,
            user_message,
            streamed,
            outcome,
        })
    }

    /// 把中断时的占位定稿为已接收的部分
    async fn close_partial(
        &self,
        session_id: SessionId,
        partial: &str,
    ) -> Result<(), RepositoryError> {
        if !partial.is_empty() {
            self.store
                .finalize_turn(session_id, ChatMessage::assistant(partial))
                .await?;
        }
        Ok(())
    }

    /// 把失败说明写入对话
    async fn fail(
        &self,
        session_id: SessionId,
        failure: ChatFailure,
    ) -> Result<TurnOutcome, RepositoryError> {
        tracing::error!("[SendMessageHandler] Error during AI session: {}", failure);

        let explanation = self.classifier.render(&failure);
        self.store
            .append_message(session_id, ChatMessage::assistant(explanation))
            .await?;
        self.notify(Notification::error("Error during AI session."));

        Ok(TurnOutcome::Failed { failure })
    }
}

#[async_trait]
impl CommandHandler<SendMessageCommand, SendMessageResponse> for SendMessageHandler {
    async fn handle(
        &self,
        command: SendMessageCommand,
    ) -> Result<SendMessageResponse, ApplicationError> {
        // 验证输入
        if command.content.trim().is_empty() {
            return Err(ApplicationError::ValidationError(
                "Message content cannot be empty".to_string(),
            ));
        }
        if command.content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ApplicationError::ValidationError(format!(
                "Message content exceeds {} characters",
                MAX_MESSAGE_LENGTH
            )));
        }

        let session_id = match self.resolve_session(command.session_id).await {
            Ok(id) => id,
            Err(e) => {
                if let Some(requested) = command.session_id {
                    self.settle(requested, Some(FailureKind::Unknown));
                }
                return Err(e);
            }
        };

        let lock = self.turn_lock(session_id).await;
        let result = {
            let _turn = lock.lock().await;
            self.send_in_session(session_id, command).await
        };
        self.release_turn_lock(session_id, lock).await;
        result
    }
}
