//! イメージ名の組み立て
//!
//! ローカルタグ（`name:tag`）とレジストリ込みのリモートタグ
//! （`registry/name:tag`）を扱います。

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};

/// タグ未指定時のデフォルト
pub const DEFAULT_TAG: &str = "latest";

/// ビルド対象イメージの名前情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImage {
    registry: String,
    name: String,
    directory: PathBuf,
    tag: String,
}

impl DockerImage {
    pub fn new(
        registry: impl Into<String>,
        name: impl Into<String>,
        directory: impl Into<PathBuf>,
        tag: Option<&str>,
    ) -> Self {
        let tag = tag.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TAG);
        Self {
            registry: registry.into().trim_end_matches('/').to_string(),
            name: name.into(),
            directory: directory.into(),
            tag: tag.to_string(),
        }
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// ビルドコンテキストとなるディレクトリ
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// ローカルのイメージストアで使うタグ
    pub fn local_tag(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }

    /// タグを除いたリモートのリポジトリ名（`registry/name`）
    ///
    /// レジストリが空の場合は `name` のみになります。
    pub fn remote_repository(&self) -> String {
        if self.registry.is_empty() {
            return self.name.clone();
        }
        format!("{}/{}", self.registry, self.name)
    }

    /// レジストリ込みのタグ
    pub fn remote_tag(&self) -> String {
        format!("{}:{}", self.remote_repository(), self.tag)
    }
}

/// タグのバリデーション
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '.' | '-' | '_'))
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}
