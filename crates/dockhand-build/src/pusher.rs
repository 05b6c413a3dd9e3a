//! イメージプッシュ処理
//!
//! ローカルでビルドしたイメージにリモートタグを付け、レジストリへプッシュします。

use crate::auth::RegistryCredential;
use crate::engine::ContainerEngine;
use crate::error::{BuildError, BuildResult};
use crate::image::validate_tag;
use crate::output::LogSink;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    engine: Arc<dyn ContainerEngine>,
}

impl ImagePusher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    /// `local_tag` に `repository:tag` を付けてプッシュ
    ///
    /// 1. 認証情報をエンコード
    /// 2. タグ付け（失敗したらプッシュしない）
    /// 3. プッシュ（`limit` で打ち切り）
    pub async fn push(
        &self,
        local_tag: &str,
        repository: &str,
        tag: &str,
        credential: &RegistryCredential,
        sink: &mut dyn LogSink,
        limit: Duration,
    ) -> BuildResult<()> {
        validate_tag(tag)?;

        let registry_auth = credential.encode()?;

        tracing::debug!("Tagging {} as {}:{}", local_tag, repository, tag);
        self.engine.tag_image(local_tag, repository, tag).await?;

        tracing::info!("Pushing {}:{}", repository, tag);
        tokio::time::timeout(limit, self.drain(repository, tag, &registry_auth, sink))
            .await
            .map_err(|_| BuildError::Timeout {
                operation: "image push",
                limit,
            })??;

        tracing::info!("Successfully pushed: {}:{}", repository, tag);
        Ok(())
    }

    async fn drain(
        &self,
        repository: &str,
        tag: &str,
        registry_auth: &str,
        sink: &mut dyn LogSink,
    ) -> BuildResult<()> {
        let mut stream = self.engine.push_image(repository, tag, registry_auth);
        let mut error_message: Option<String> = None;

        while let Some(result) = stream.next().await {
            let info = result?;
            sink.write_message(&info);
            if let Some(err) = info.error {
                error_message = Some(err);
            }
        }

        match error_message {
            Some(message) => Err(BuildError::PushFailed { message }),
            None => Ok(()),
        }
    }
}
