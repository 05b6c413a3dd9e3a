//! ビルドとプッシュをまとめたサービス
//!
//! CLI はプロジェクト、イメージ名、Dockerfile名、エンジンを渡して
//! [`DockerService`] を作り、`build()` → `push()` の順に呼び出します。

use crate::auth::RegistryCredential;
use crate::builder::ImageBuilder;
use crate::context::ContextBuilder;
use crate::engine::{BuildRequest, ContainerEngine};
use crate::error::{BuildError, BuildResult};
use crate::image::DockerImage;
use crate::output::LogSink;
use crate::project::DockerfileSource;
use crate::pusher::ImagePusher;
use std::sync::Arc;
use std::time::Duration;

/// ビルドのデフォルト上限
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// プッシュのデフォルト上限
pub const DEFAULT_PUSH_TIMEOUT: Duration = Duration::from_secs(120);

/// 呼び出しごとの期限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    pub build_timeout: Duration,
    pub push_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            build_timeout: DEFAULT_BUILD_TIMEOUT,
            push_timeout: DEFAULT_PUSH_TIMEOUT,
        }
    }
}

pub struct DockerService {
    engine: Arc<dyn ContainerEngine>,
    project: Arc<dyn DockerfileSource>,
    image: DockerImage,
    dockerfile_name: String,
    credential: RegistryCredential,
    settings: ServiceSettings,
}

impl DockerService {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        project: Arc<dyn DockerfileSource>,
        image: DockerImage,
        dockerfile_name: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            project,
            image,
            dockerfile_name: dockerfile_name.into(),
            credential: RegistryCredential::default(),
            settings: ServiceSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_credential(mut self, credential: RegistryCredential) -> Self {
        self.credential = credential;
        self
    }

    pub fn image(&self) -> &DockerImage {
        &self.image
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// ビルドコンテキストを組み立ててローカルタグでビルド
    ///
    /// コンテキストの組み立てに失敗した場合、エンジンには何も送りません。
    pub async fn build(&self, sink: &mut dyn LogSink) -> BuildResult<()> {
        let local_tag = self.image.local_tag();
        tracing::info!("Building {}", local_tag);

        let context = ContextBuilder::create_context(
            self.image.directory(),
            &self.dockerfile_name,
            self.project.as_ref(),
        )?;

        let request = BuildRequest {
            dockerfile: self.dockerfile_name.clone(),
            tag: local_tag,
            remove: true,
        };

        ImageBuilder::new(Arc::clone(&self.engine))
            .build_image(&context, &request, sink, self.settings.build_timeout)
            .await
    }

    /// リモートタグを付けてレジストリへプッシュ
    pub async fn push(&self, sink: &mut dyn LogSink) -> BuildResult<()> {
        let remote_tag = self.image.remote_tag();
        if self.image.registry().is_empty() {
            return Err(BuildError::InvalidConfig(
                "registry is required to push an image".to_string(),
            ));
        }

        tracing::info!("Pushing to {}", remote_tag);
        tracing::info!("User: {}", self.credential.username());

        ImagePusher::new(Arc::clone(&self.engine))
            .push(
                &self.image.local_tag(),
                &self.image.remote_repository(),
                self.image.tag(),
                &self.credential,
                sink,
                self.settings.push_timeout,
            )
            .await
    }
}
