use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// ビルドコンテキスト組み立ての失敗箇所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextPhase {
    /// 元アーカイブの作成
    Archive,
    /// 元アーカイブから次のエントリを読む
    ReadEntry,
    /// ヘッダと内容を新しいアーカイブへコピー
    CopyEntry,
    /// 生成した Dockerfile の追加
    AppendDockerfile,
    /// アーカイブのクローズ
    Finish,
}

impl fmt::Display for ContextPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextPhase::Archive => "archiving build directory",
            ContextPhase::ReadEntry => "reading context entry",
            ContextPhase::CopyEntry => "copying context entry",
            ContextPhase::AppendDockerfile => "writing generated Dockerfile",
            ContextPhase::Finish => "closing context archive",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Error {phase}: {source}")]
    Context {
        phase: ContextPhase,
        #[source]
        source: std::io::Error,
    },

    #[error("Loading Dockerfile: {0}")]
    Dockerfile(String),

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Tagging {source_tag} as {target}: {message}")]
    TagFailed {
        source_tag: String,
        target: String,
        message: String,
    },

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Registry authentication failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Invalid image tag: {tag}")]
    InvalidTag { tag: String },

    #[error("{operation} timed out after {}s", limit.as_secs())]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),
}

impl BuildError {
    pub(crate) fn context(phase: ContextPhase) -> impl FnOnce(std::io::Error) -> Self {
        move |source| BuildError::Context { phase, source }
    }

    /// 期限切れかどうか
    pub fn is_timeout(&self) -> bool {
        matches!(self, BuildError::Timeout { .. })
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::ContextNotFound(path) => {
                format!(
                    "ビルドコンテキストが見つかりません: {}\n\
                     \n\
                     --project-directory または dockhand.yaml の project_directory を確認してください。",
                    path.display()
                )
            }
            BuildError::Dockerfile(msg) => {
                format!(
                    "Dockerfileを生成できませんでした: {}\n\
                     \n\
                     package.json または go.mod があるディレクトリを指定するか、\n\
                     --dockerfile-name で既存のDockerfileを指定してください。",
                    msg
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     Dockerfileの内容を確認してください。",
                    msg
                )
            }
            BuildError::TagFailed { source_tag, .. } => {
                format!(
                    "{}\n\
                     \n\
                     ローカルイメージ {} が存在するか確認してください（先に build を実行）。",
                    self, source_tag
                )
            }
            BuildError::Timeout { operation, limit } => {
                format!(
                    "{} が {} 秒以内に完了しませんでした。\n\
                     \n\
                     --build-timeout / --push-timeout で上限を延ばせます。",
                    operation,
                    limit.as_secs()
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;

pub type Result<T> = BuildResult<T>;
