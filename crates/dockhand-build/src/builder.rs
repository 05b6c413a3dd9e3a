use crate::context::BuildContext;
use crate::engine::{BuildRequest, ContainerEngine, EngineMessage};
use crate::error::{BuildError, Result};
use crate::output::LogSink;
use futures_util::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;

pub struct ImageBuilder {
    engine: Arc<dyn ContainerEngine>,
}

impl ImageBuilder {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// イメージをビルド
    ///
    /// リクエストの送信からレスポンスを読み切るまでを `limit` で打ち切ります。
    /// 期限切れの場合はストリームを破棄して [`BuildError::Timeout`] を返します。
    pub async fn build_image(
        &self,
        context: &BuildContext,
        request: &BuildRequest,
        sink: &mut dyn LogSink,
        limit: Duration,
    ) -> Result<()> {
        let tag = &request.tag;
        tracing::info!("Building image: {}", tag);
        tracing::debug!(
            "Build request: dockerfile={}, context={} bytes",
            request.dockerfile,
            context.len()
        );

        tokio::time::timeout(limit, self.drain(context, request, sink))
            .await
            .map_err(|_| BuildError::Timeout {
                operation: "image build",
                limit,
            })??;

        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }

    async fn drain(
        &self,
        context: &BuildContext,
        request: &BuildRequest,
        sink: &mut dyn LogSink,
    ) -> Result<()> {
        let mut stream = self.engine.build_image(context.bytes(), request);

        while let Some(msg) = stream.next().await {
            let output = msg?;
            sink.write_message(&output);
            Self::check_output(output)?;
        }

        Ok(())
    }

    /// ストリーム中のエラーメッセージ
    fn check_output(output: EngineMessage) -> Result<()> {
        match output.error {
            Some(error) => Err(BuildError::BuildFailed(error)),
            None => Ok(()),
        }
    }
}
