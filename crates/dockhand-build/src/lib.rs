//! dockhand のイメージビルド機能
//!
//! ビルドディレクトリと生成 Dockerfile からビルドコンテキストをメモリ上で組み立て、
//! コンテナエンジンでビルドし、リモートタグを付けてレジストリへプッシュします。

pub mod auth;
pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod image;
pub mod output;
pub mod project;
pub mod pusher;
pub mod service;

pub use auth::{RegistryAuth, RegistryCredential};
pub use builder::ImageBuilder;
pub use context::{BuildContext, ContextBuilder, GENERATED_DOCKERFILE};
pub use engine::{BollardEngine, BuildRequest, ContainerEngine, EngineMessage, MessageStream};
pub use error::{BuildError, BuildResult, ContextPhase};
pub use image::{DockerImage, validate_tag};
pub use output::{ConsoleSink, LogSink};
pub use project::{DockerfileSource, Project, ProjectKind};
pub use pusher::ImagePusher;
pub use service::{DEFAULT_BUILD_TIMEOUT, DEFAULT_PUSH_TIMEOUT, DockerService, ServiceSettings};
