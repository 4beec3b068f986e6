use futures::{Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use super::{GatewayError, SessionStore};
use crate::modules::chat::domain::SessionId;
use crate::modules::chat::ports::RepositoryError;

/// 折叠中断的原因，均携带截至中断时的累积文本
#[derive(Debug, Error)]
pub enum ReduceError {
    #[error("Error reading stream: {source}")]
    Read {
        partial: String,
        #[source]
        source: GatewayError,
    },

    #[error("Stream cancelled")]
    Cancelled { partial: String },

    #[error(transparent)]
    Store(#[from] RepositoryError),
}

/// 等待取消信号；发送端已丢弃时永不返回
pub async fn cancelled(signal: &mut watch::Receiver<bool>) {
    loop {
        if *signal.borrow_and_update() {
            return;
        }
        if signal.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

/// 流式折叠器
///
/// 逐个拉取增量并累加，每次把完整的累积文本发布为本回合的流式占位
pub struct StreamReducer {
    store: Arc<SessionStore>,
    session_id: SessionId,
}

impl StreamReducer {
    pub fn new(store: Arc<SessionStore>, session_id: SessionId) -> Self {
        Self { store, session_id }
    }

    /// 消费整个流，正常结束时返回最终文本
    ///
    /// 取消后立即丢弃流，不再发布任何更新
    pub async fn reduce<S>(
        &self,
        mut deltas: S,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<String, ReduceError>
    where
        S: Stream<Item = Result<String, GatewayError>> + Unpin,
    {
        let mut accumulated = String::new();

        loop {
            tokio::select! {
                biased;

                _ = cancelled(&mut cancel) => {
                    drop(deltas);
                    tracing::info!(
                        "[StreamReducer] Stream for {} cancelled after {} bytes",
                        self.session_id,
                        accumulated.len()
                    );
                    return Err(ReduceError::Cancelled { partial: accumulated });
                }

                next = deltas.next() => match next {
                    Some(Ok(delta)) => {
                        accumulated.push_str(&delta);
                        self.store
                            .publish_partial(self.session_id, &accumulated)
                            .await?;
                    }
                    Some(Err(source)) => {
                        tracing::error!("[StreamReducer] Error reading stream: {}", source);
                        return Err(ReduceError::Read {
                            partial: accumulated,
                            source,
                        });
                    }
                    None => return Ok(accumulated),
                },
            }
        }
    }
}
