use crate::error::{BuildError, BuildResult, ContextPhase};
use crate::project::DockerfileSource;
use bytes::Bytes;
use std::io::Cursor;
use std::path::Path;
use tar::{Archive, Builder, EntryType, Header};

/// このファイル名が指定された場合は Dockerfile をプロジェクトから生成する
pub const GENERATED_DOCKERFILE: &str = "Dockerfile.dockhand";

/// 生成 Dockerfile エントリのパーミッション
const GENERATED_DOCKERFILE_MODE: u32 = 0o600;

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

/// 組み立て済みのビルドコンテキスト（非圧縮tar）
///
/// 中身は不変で、`reader()` で何度でも先頭から読み直せます。
#[derive(Debug, Clone)]
pub struct BuildContext {
    data: Bytes,
    entries: usize,
}

impl BuildContext {
    /// tarに含まれるエントリ数
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// シーク可能なリーダーを作成
    pub fn reader(&self) -> Cursor<Bytes> {
        Cursor::new(self.data.clone())
    }

    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

pub struct ContextBuilder;

impl ContextBuilder {
    /// ディレクトリからビルドコンテキストを作成
    ///
    /// ディレクトリをtar化した各エントリを新しいアーカイブへコピーし、
    /// `dockerfile_name` が [`GENERATED_DOCKERFILE`] の場合は
    /// `source` から取得した Dockerfile を最後に追加します。
    /// 同名のファイルがディレクトリにあっても置き換えず、両方を残します。
    pub fn create_context(
        context_path: &Path,
        dockerfile_name: &str,
        source: &dyn DockerfileSource,
    ) -> BuildResult<BuildContext> {
        if !context_path.exists() {
            return Err(BuildError::ContextNotFound(context_path.to_path_buf()));
        }
        if !context_path.is_dir() {
            return Err(BuildError::InvalidConfig(format!(
                "Build context is not a directory: {}",
                context_path.display()
            )));
        }

        tracing::debug!("Creating build context from: {}", context_path.display());

        let existing = Self::archive_directory(context_path)?;

        let mut tar = Builder::new(Vec::new());
        let mut entries = Self::copy_entries(&existing, &mut tar)?;

        if dockerfile_name == GENERATED_DOCKERFILE {
            let content = source.dockerfile()?;
            Self::append_generated_dockerfile(&mut tar, &content)?;
            entries += 1;
        }

        let data = tar
            .into_inner()
            .map_err(BuildError::context(ContextPhase::Finish))?;

        tracing::debug!(
            "Build context created: {} entries, {} bytes",
            entries,
            data.len()
        );
        Self::check_context_size(data.len());

        Ok(BuildContext {
            data: Bytes::from(data),
            entries,
        })
    }

    /// ディレクトリを再帰的にtar化（先頭の `./` なし）
    ///
    /// シンボリックリンクは辿らずリンクのまま格納します。
    fn archive_directory(context_path: &Path) -> BuildResult<Vec<u8>> {
        let mut tar = Builder::new(Vec::new());
        tar.follow_symlinks(false);
        tar.append_dir_all("", context_path)
            .map_err(BuildError::context(ContextPhase::Archive))?;
        tar.into_inner()
            .map_err(BuildError::context(ContextPhase::Archive))
    }

    /// 既存アーカイブのエントリを1つずつコピーし、コピーした数を返す
    fn copy_entries(existing: &[u8], tar: &mut Builder<Vec<u8>>) -> BuildResult<usize> {
        let mut archive = Archive::new(existing);
        let mut count = 0;

        for entry in archive
            .entries()
            .map_err(BuildError::context(ContextPhase::ReadEntry))?
        {
            let mut entry = entry.map_err(BuildError::context(ContextPhase::ReadEntry))?;
            let path = entry
                .path()
                .map_err(BuildError::context(ContextPhase::ReadEntry))?
                .into_owned();
            let mut header = entry.header().clone();

            if header.entry_type() == EntryType::Symlink || header.entry_type() == EntryType::Link {
                let target = entry
                    .link_name()
                    .map_err(BuildError::context(ContextPhase::ReadEntry))?
                    .map(|p| p.into_owned());
                if let Some(target) = target {
                    tar.append_link(&mut header, &path, &target)
                        .map_err(BuildError::context(ContextPhase::CopyEntry))?;
                    count += 1;
                    continue;
                }
            }

            tar.append_data(&mut header, &path, &mut entry)
                .map_err(BuildError::context(ContextPhase::CopyEntry))?;
            count += 1;
        }

        Ok(count)
    }

    fn append_generated_dockerfile(tar: &mut Builder<Vec<u8>>, content: &[u8]) -> BuildResult<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(content.len() as u64);
        header.set_mode(GENERATED_DOCKERFILE_MODE);
        header.set_mtime(chrono::Utc::now().timestamp().max(0) as u64);

        tar.append_data(&mut header, GENERATED_DOCKERFILE, content)
            .map_err(BuildError::context(ContextPhase::AppendDockerfile))
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 不要なファイルをビルドディレクトリから除外することを推奨します。",
                size / 1024 / 1024
            );
        }
    }
}
