use async_trait::async_trait;
use bytes::Bytes;
use dockhand_build::{
    BuildError, BuildRequest, BuildResult, ContainerEngine, DockerfileSource, EngineMessage,
    LogSink, MessageStream,
};
use futures_util::stream::{self, StreamExt};
use std::sync::Mutex;
use std::time::Duration;

/// 呼び出しを記録するだけのエンジン
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<String>>,
    pub last_context: Mutex<Option<Bytes>>,
    pub last_request: Mutex<Option<BuildRequest>>,
    pub last_auth: Mutex<Option<String>>,
    pub build_messages: Vec<EngineMessage>,
    pub push_messages: Vec<EngineMessage>,
    pub build_delay: Duration,
    pub push_delay: Duration,
    pub fail_tag: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn delayed(delay: Duration, messages: Vec<EngineMessage>) -> MessageStream<'static> {
    stream::once(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    })
    .flat_map(move |_| stream::iter(messages.clone().into_iter().map(Ok)))
    .boxed()
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    fn build_image<'a>(&'a self, context: Bytes, request: &BuildRequest) -> MessageStream<'a> {
        self.record(format!("build {}", request.tag));
        *self.last_context.lock().unwrap() = Some(context);
        *self.last_request.lock().unwrap() = Some(request.clone());
        delayed(self.build_delay, self.build_messages.clone())
    }

    async fn tag_image(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()> {
        self.record(format!("tag {} {}:{}", source, repository, tag));
        if self.fail_tag {
            return Err(BuildError::TagFailed {
                source_tag: source.to_string(),
                target: format!("{}:{}", repository, tag),
                message: "No such image".to_string(),
            });
        }
        Ok(())
    }

    fn push_image<'a>(
        &'a self,
        repository: &str,
        tag: &str,
        registry_auth: &str,
    ) -> MessageStream<'a> {
        self.record(format!("push {}:{}", repository, tag));
        *self.last_auth.lock().unwrap() = Some(registry_auth.to_string());
        delayed(self.push_delay, self.push_messages.clone())
    }
}

/// 固定の Dockerfile を返す
pub struct StaticProject(pub Vec<u8>);

impl DockerfileSource for StaticProject {
    fn dockerfile(&self) -> BuildResult<Vec<u8>> {
        Ok(self.0.clone())
    }
}

/// 受け取ったメッセージを溜める
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Vec<EngineMessage>,
}

impl LogSink for RecordingSink {
    fn write_message(&mut self, message: &EngineMessage) {
        self.messages.push(message.clone());
    }
}
