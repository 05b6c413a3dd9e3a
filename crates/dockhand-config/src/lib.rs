pub mod error;

pub use error::*;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// カレントディレクトリで探すファイル名（優先順）
const CANDIDATES: [&str; 3] = ["dockhand.local.yaml", "dockhand.yaml", ".dockhand.yaml"];

/// プロジェクト設定
///
/// すべて任意項目で、CLI フラグや環境変数が指定された場合はそちらが優先されます。
/// レジストリのパスワードはファイルからは読みません。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app_name: Option<String>,
    pub app_version: Option<String>,
    pub project_directory: Option<PathBuf>,
    pub registry: Option<String>,
    pub dockerfile_name: Option<String>,
    pub registry_user: Option<String>,
    pub runtime_version: Option<String>,
    pub build_timeout_secs: Option<u64>,
    pub push_timeout_secs: Option<u64>,
}

impl Settings {
    /// YAML ファイルを読み込む
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        // 空ファイルは null として解釈されるのでデフォルト扱い
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn build_timeout(&self) -> Option<Duration> {
        self.build_timeout_secs.map(Duration::from_secs)
    }

    pub fn push_timeout(&self) -> Option<Duration> {
        self.push_timeout_secs.map(Duration::from_secs)
    }

    /// 相対パスの project_directory を設定ファイルの場所から解決
    fn resolve_relative_to(mut self, config_path: &Path) -> Self {
        if let (Some(dir), Some(base)) = (&self.project_directory, config_path.parent())
            && dir.is_relative()
        {
            self.project_directory = Some(base.join(dir));
        }
        self
    }
}

/// 設定ファイルを探す
///
/// 以下の優先順位で検索:
/// 1. 環境変数 DOCKHAND_CONFIG_PATH (直接パス指定、存在しなければエラー)
/// 2. カレントディレクトリ: dockhand.local.yaml, dockhand.yaml, .dockhand.yaml
/// 3. ~/.config/dockhand/config.yaml (グローバル設定)
///
/// どれも見つからなければ `Ok(None)`。
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var("DOCKHAND_CONFIG_PATH") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("dockhand").join("config.yaml");
        if global_config.exists() {
            return Ok(Some(global_config));
        }
    }

    Ok(None)
}

/// 設定ファイルを探して読み込む（なければデフォルト）
pub fn load_settings() -> Result<Settings> {
    match find_config_file()? {
        Some(path) => {
            tracing::debug!("Loading settings from {}", path.display());
            Ok(Settings::from_file(&path)?.resolve_relative_to(&path))
        }
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}
