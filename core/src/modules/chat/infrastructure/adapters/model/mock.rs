use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::modules::chat::ports::{
    Availability, DeltaStream, ModelCapability, ModelError, ModelSession, SessionOptions,
};

/// 模拟回复脚本
#[derive(Debug, Clone)]
pub enum MockScript {
    /// 回显用户输入，按 5 个字符切块
    Echo,
    /// 依次产出给定的增量后正常结束
    Reply(Vec<String>),
    /// 产出给定增量后以宿主错误中断
    FailAfter { chunks: Vec<String>, error: String },
    /// 产出给定增量后永不结束
    Pending(Vec<String>),
    /// 请求直接失败
    Reject(String),
}

impl MockScript {
    pub fn reply<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockScript::Reply(chunks.into_iter().map(Into::into).collect())
    }
}

/// 模拟宿主的共享计数
#[derive(Debug, Default)]
struct MockCounters {
    probes: AtomicUsize,
    created: AtomicUsize,
    released: AtomicUsize,
    prompts: AtomicUsize,
}

/// 模拟模型能力
///
/// 不做推理，按脚本产出文本，用于开发和测试
pub struct MockModelCapability {
    availability: Availability,
    creation_error: Option<String>,
    script: MockScript,
    chunk_delay: Option<Duration>,
    counters: Arc<MockCounters>,
    last_options: Mutex<Option<SessionOptions>>,
}

impl MockModelCapability {
    pub fn new() -> Self {
        Self {
            availability: Availability::Readily,
            creation_error: None,
            script: MockScript::Echo,
            chunk_delay: None,
            counters: Arc::new(MockCounters::default()),
            last_options: Mutex::new(None),
        }
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// 探测通过但创建会话失败
    pub fn with_creation_error(mut self, error: impl Into<String>) -> Self {
        self.creation_error = Some(error.into());
        self
    }

    pub fn with_script(mut self, script: MockScript) -> Self {
        self.script = script;
        self
    }

    /// 每个增量前等待一段时间
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    pub fn probe_count(&self) -> usize {
        self.counters.probes.load(Ordering::SeqCst)
    }

    pub fn created_count(&self) -> usize {
        self.counters.created.load(Ordering::SeqCst)
    }

    pub fn released_count(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn prompt_count(&self) -> usize {
        self.counters.prompts.load(Ordering::SeqCst)
    }

    /// 最近一次创建会话时使用的参数
    pub async fn last_options(&self) -> Option<SessionOptions> {
        *self.last_options.lock().await
    }
}

impl Default for MockModelCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelCapability for MockModelCapability {
    async fn probe_availability(&self) -> Result<Availability, ModelError> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.availability)
    }

    async fn create_session(
        &self,
        options: SessionOptions,
    ) -> Result<Box<dyn ModelSession>, ModelError> {
        if let Some(error) = &self.creation_error {
            return Err(ModelError::Host(error.clone()));
        }

        *self.last_options.lock().await = Some(options);
        self.counters.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockModelSession {
            script: self.script.clone(),
            chunk_delay: self.chunk_delay,
            counters: self.counters.clone(),
            released: AtomicBool::new(false),
        }))
    }
}

fn ready_chunks(
    chunks: Vec<String>,
) -> impl futures::Stream<Item = Result<String, ModelError>> + Send + Unpin {
    stream::iter(chunks.into_iter().map(Ok))
}

/// 模拟模型会话
pub struct MockModelSession {
    script: MockScript,
    chunk_delay: Option<Duration>,
    counters: Arc<MockCounters>,
    released: AtomicBool,
}

impl MockModelSession {
    fn ensure_live(&self) -> Result<(), ModelError> {
        if self.released.load(Ordering::SeqCst) {
            return Err(ModelError::Released);
        }
        Ok(())
    }

    fn echo(text: &str) -> String {
        format!("You said: 「{}」. This is a simulated reply.", text)
    }

    /// 按 5 个字符切块模拟流式输出
    fn split_chunks(content: &str) -> Vec<String> {
        content
            .chars()
            .collect::<Vec<_>>()
            .chunks(5)
            .map(|c| c.iter().collect::<String>())
            .collect()
    }

    fn delayed(&self, deltas: DeltaStream) -> DeltaStream {
        match self.chunk_delay {
            Some(delay) => Box::pin(deltas.then(move |item| async move {
                tokio::time::sleep(delay).await;
                item
            })),
            None => deltas,
        }
    }
}

#[async_trait]
impl ModelSession for MockModelSession {
    async fn prompt(&self, text: &str) -> Result<String, ModelError> {
        self.ensure_live()?;
        self.counters.prompts.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.chunk_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.script {
            MockScript::Echo => Ok(Self::echo(text)),
            MockScript::Reply(chunks) | MockScript::Pending(chunks) => Ok(chunks.concat()),
            MockScript::FailAfter { error, .. } | MockScript::Reject(error) => {
                Err(ModelError::Host(error.clone()))
            }
        }
    }

    async fn prompt_streaming(&self, text: &str) -> Result<DeltaStream, ModelError> {
        self.ensure_live()?;
        self.counters.prompts.fetch_add(1, Ordering::SeqCst);

        let deltas: DeltaStream = match &self.script {
            MockScript::Echo => Box::pin(ready_chunks(Self::split_chunks(&Self::echo(text)))),
            MockScript::Reply(chunks) => Box::pin(ready_chunks(chunks.clone())),
            MockScript::FailAfter { chunks, error } => {
                let failure = Err(ModelError::Host(error.clone()));
                Box::pin(ready_chunks(chunks.clone()).chain(stream::iter(vec![failure])))
            }
            MockScript::Pending(chunks) => {
                Box::pin(ready_chunks(chunks.clone()).chain(stream::pending()))
            }
            MockScript::Reject(error) => return Err(ModelError::Host(error.clone())),
        };

        Ok(self.delayed(deltas))
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_stream_matches_prompt() {
        let capability = MockModelCapability::new();
        let session = capability
            .create_session(SessionOptions::default())
            .await
            .unwrap();

        let whole = session.prompt("hi").await.unwrap();
        let deltas: Vec<String> = session
            .prompt_streaming("hi")
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert!(deltas.iter().all(|d| d.chars().count() <= 5));
        assert_eq!(deltas.concat(), whole);
        assert_eq!(capability.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_fail_after_chunks() {
        let capability = MockModelCapability::new().with_script(MockScript::FailAfter {
            chunks: vec!["Hel".to_string()],
            error: "network down".to_string(),
        });
        let session = capability
            .create_session(SessionOptions::default())
            .await
            .unwrap();

        let items: Vec<_> = session.prompt_streaming("x").await.unwrap().collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("Hel".to_string()));
        assert_eq!(items[1], Err(ModelError::Host("network down".to_string())));
    }

    #[tokio::test]
    async fn test_release_is_counted_once() {
        let capability = MockModelCapability::new();
        let session = capability
            .create_session(SessionOptions::default().with_top_k(3))
            .await
            .unwrap();

        session.release();
        session.release();

        assert_eq!(capability.released_count(), 1);
        assert_eq!(session.prompt("x").await, Err(ModelError::Released));
        assert_eq!(capability.last_options().await.unwrap().top_k, Some(3));
    }

    #[tokio::test]
    async fn test_creation_error() {
        let capability = MockModelCapability::new().with_creation_error("model not downloaded");
        let result = capability.create_session(SessionOptions::default()).await;
        assert!(matches!(result, Err(ModelError::Host(_))));
        assert_eq!(capability.created_count(), 0);
    }
}
