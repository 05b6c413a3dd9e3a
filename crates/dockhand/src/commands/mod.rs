pub mod build;
pub mod dockerfile;
pub mod push;

use clap::Args;
use dockhand_build::{
    DockerImage, DockerService, GENERATED_DOCKERFILE, Project, RegistryAuth, RegistryCredential,
    ServiceSettings,
};
use dockhand_config::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// 全サブコマンド共通のオプション
///
/// 指定がない項目は設定ファイル（dockhand.yaml）の値を使います。
#[derive(Args, Debug, Default)]
pub struct ProjectArgs {
    /// ビルドコンテキストのディレクトリ
    #[arg(long, env = "DOCKHAND_PROJECT_DIRECTORY", global = true)]
    pub project_directory: Option<PathBuf>,
    /// アプリケーション名（イメージ名）
    #[arg(long, env = "DOCKHAND_APP_NAME", global = true)]
    pub app_name: Option<String>,
    /// イメージタグ（省略時は latest）
    #[arg(long, env = "DOCKHAND_APP_VERSION", global = true)]
    pub app_version: Option<String>,
    /// プッシュ先レジストリ (例: ghcr.io/acme)
    #[arg(long, env = "DOCKHAND_REGISTRY", global = true)]
    pub registry: Option<String>,
    /// コンテキスト内のDockerfile名（省略時は自動生成）
    #[arg(long, env = "DOCKHAND_DOCKERFILE_NAME", global = true)]
    pub dockerfile_name: Option<String>,
    /// 生成Dockerfileのランタイムバージョン
    #[arg(long, env = "DOCKHAND_RUNTIME_VERSION", global = true)]
    pub runtime_version: Option<String>,
    /// レジストリのユーザー名
    #[arg(long, env = "DOCKHAND_REGISTRY_USER", global = true)]
    pub registry_user: Option<String>,
    /// レジストリのパスワードまたはトークン
    #[arg(
        long,
        env = "DOCKHAND_REGISTRY_PASSWORD",
        global = true,
        hide_env_values = true
    )]
    pub registry_password: Option<String>,
    /// ビルドの上限時間（秒）
    #[arg(long, value_name = "SECONDS", global = true)]
    pub build_timeout: Option<u64>,
    /// プッシュの上限時間（秒）
    #[arg(long, value_name = "SECONDS", global = true)]
    pub push_timeout: Option<u64>,
}

/// CLI と設定ファイルをマージした結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub directory: PathBuf,
    pub app_name: String,
    pub app_version: Option<String>,
    pub registry: String,
    pub dockerfile_name: String,
    pub runtime_version: Option<String>,
    pub registry_user: Option<String>,
    pub registry_password: Option<String>,
    pub settings: ServiceSettings,
}

impl ProjectArgs {
    /// CLI > 環境変数 > 設定ファイル > デフォルト の順で解決
    pub fn resolve(&self, file: &Settings) -> anyhow::Result<ProjectConfig> {
        let directory = match self
            .project_directory
            .clone()
            .or_else(|| file.project_directory.clone())
        {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };

        let app_name = self
            .app_name
            .clone()
            .or_else(|| file.app_name.clone())
            .or_else(|| {
                std::fs::canonicalize(&directory)
                    .ok()
                    .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()))
            })
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "アプリケーション名を決定できません。--app-name を指定してください"
                )
            })?;

        let defaults = ServiceSettings::default();
        let settings = ServiceSettings {
            build_timeout: self
                .build_timeout
                .map(Duration::from_secs)
                .or_else(|| file.build_timeout())
                .unwrap_or(defaults.build_timeout),
            push_timeout: self
                .push_timeout
                .map(Duration::from_secs)
                .or_else(|| file.push_timeout())
                .unwrap_or(defaults.push_timeout),
        };

        Ok(ProjectConfig {
            directory,
            app_name,
            app_version: self.app_version.clone().or_else(|| file.app_version.clone()),
            registry: self
                .registry
                .clone()
                .or_else(|| file.registry.clone())
                .unwrap_or_default(),
            dockerfile_name: self
                .dockerfile_name
                .clone()
                .or_else(|| file.dockerfile_name.clone())
                .unwrap_or_else(|| GENERATED_DOCKERFILE.to_string()),
            runtime_version: self
                .runtime_version
                .clone()
                .or_else(|| file.runtime_version.clone()),
            registry_user: self
                .registry_user
                .clone()
                .or_else(|| file.registry_user.clone()),
            registry_password: self.registry_password.clone(),
            settings,
        })
    }
}

impl ProjectConfig {
    pub fn image(&self) -> DockerImage {
        DockerImage::new(
            &self.registry,
            &self.app_name,
            &self.directory,
            self.app_version.as_deref(),
        )
    }

    pub fn project(&self) -> Project {
        let project = Project::detect(&self.app_name, &self.directory);
        match &self.runtime_version {
            Some(version) => project.with_runtime_version(version),
            None => project,
        }
    }

    /// プッシュ用の認証情報
    ///
    /// ユーザー名とパスワードが両方指定されていればそれを使い、
    /// なければ Docker の config.json を参照します。
    pub fn credential(&self) -> anyhow::Result<RegistryCredential> {
        if let (Some(user), Some(password)) = (&self.registry_user, &self.registry_password) {
            return Ok(RegistryCredential::new(user, password));
        }

        if let Some(user) = self.user_without_password() {
            tracing::warn!(
                "Registry user '{}' has no password; falling back to Docker config.json",
                user
            );
        }

        let remote_tag = self.image().remote_tag();
        Ok(RegistryAuth::new()
            .get_credentials(&remote_tag)?
            .unwrap_or_default())
    }

    /// パスワードなしで指定されたユーザー名
    fn user_without_password(&self) -> Option<&str> {
        match (&self.registry_user, &self.registry_password) {
            (Some(user), None) => Some(user.as_str()),
            _ => None,
        }
    }

    pub fn service(&self, engine: Arc<dyn dockhand_build::ContainerEngine>) -> DockerService {
        DockerService::new(
            engine,
            Arc::new(self.project()),
            self.image(),
            &self.dockerfile_name,
        )
        .with_settings(self.settings)
    }
}
