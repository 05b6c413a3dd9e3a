//! コンテナエンジンの抽象化
//!
//! ビルド・プッシュ処理は [`ContainerEngine`] だけを呼び出します。
//! CLI からは Docker Engine API 実装の [`BollardEngine`] を渡します。

use crate::auth::RegistryCredential;
use crate::error::{BuildError, BuildResult};
use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::query_parameters::{
    BuildImageOptionsBuilder, PushImageOptionsBuilder, TagImageOptionsBuilder,
};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use http_body_util::{Either, Full};

/// 1回のビルドのオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    /// ビルドコンテキスト内の Dockerfile のパス
    pub dockerfile: String,
    /// ビルドしたイメージに付けるタグ
    pub tag: String,
    /// 成功時に中間コンテナを削除する
    pub remove: bool,
}

/// ビルド・プッシュのレスポンスストリームの1メッセージ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineMessage {
    pub stream: Option<String>,
    pub status: Option<String>,
    pub progress: Option<String>,
    pub error: Option<String>,
}

impl EngineMessage {
    pub fn stream(text: impl Into<String>) -> Self {
        Self {
            stream: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self {
            status: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            ..Default::default()
        }
    }
}

#[allow(deprecated)]
impl From<bollard::models::BuildInfo> for EngineMessage {
    fn from(info: bollard::models::BuildInfo) -> Self {
        let error = info
            .error
            .or_else(|| info.error_detail.and_then(|detail| detail.message));
        Self {
            stream: info.stream,
            status: info.status,
            progress: info.progress,
            error,
        }
    }
}

#[allow(deprecated)]
impl From<bollard::models::PushImageInfo> for EngineMessage {
    fn from(info: bollard::models::PushImageInfo) -> Self {
        Self {
            stream: None,
            status: info.status,
            progress: info.progress,
            error: info.error,
        }
    }
}

pub type MessageStream<'a> = BoxStream<'a, BuildResult<EngineMessage>>;

/// ビルドとプッシュに必要なエンジン操作
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// 非圧縮tarのコンテキストからビルドを開始
    fn build_image<'a>(&'a self, context: Bytes, request: &BuildRequest) -> MessageStream<'a>;

    /// ローカルの `source` に `repository:tag` を付ける
    async fn tag_image(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()>;

    /// `repository:tag` をプッシュ（`registry_auth` は `X-Registry-Auth` ヘッダの値）
    fn push_image<'a>(
        &'a self,
        repository: &str,
        tag: &str,
        registry_auth: &str,
    ) -> MessageStream<'a>;
}

/// Docker Engine API クライアント
#[derive(Debug, Clone)]
pub struct BollardEngine {
    docker: Docker,
}

impl BollardEngine {
    /// 既存のクライアントをラップ
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// `DOCKER_HOST` または既定のソケットに接続し、デーモンへ ping する
    ///
    /// クライアントを作れない場合やデーモンが応答しない場合は
    /// [`BuildError::DockerConnection`] を返します。
    pub async fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        tracing::debug!("Connected to Docker daemon");
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for BollardEngine {
    fn build_image<'a>(&'a self, context: Bytes, request: &BuildRequest) -> MessageStream<'a> {
        let options = BuildImageOptionsBuilder::default()
            .dockerfile(&request.dockerfile)
            .t(&request.tag)
            .rm(request.remove)
            .build();
        tracing::debug!("Build options: {:?}", options);

        self.docker
            .build_image(options, None, Some(Either::Left(Full::new(context))))
            .map(|item| item.map(EngineMessage::from).map_err(BuildError::from))
            .boxed()
    }

    async fn tag_image(&self, source: &str, repository: &str, tag: &str) -> BuildResult<()> {
        let options = TagImageOptionsBuilder::default()
            .repo(repository)
            .tag(tag)
            .build();

        self.docker
            .tag_image(source, Some(options))
            .await
            .map_err(|e| BuildError::TagFailed {
                source_tag: source.to_string(),
                target: format!("{}:{}", repository, tag),
                message: e.to_string(),
            })
    }

    fn push_image<'a>(
        &'a self,
        repository: &str,
        tag: &str,
        registry_auth: &str,
    ) -> MessageStream<'a> {
        let credentials = match RegistryCredential::decode(registry_auth) {
            Ok(credential) => credential.map(DockerCredentials::from),
            Err(e) => return futures_util::stream::once(async move { Err(e) }).boxed(),
        };

        let options = PushImageOptionsBuilder::default().tag(tag).build();

        self.docker
            .push_image(repository, Some(options), credentials)
            .map(|item| {
                item.map(EngineMessage::from).map_err(|e| BuildError::PushFailed {
                    message: e.to_string(),
                })
            })
            .boxed()
    }
}
