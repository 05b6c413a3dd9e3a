//! プロジェクト種別の判定と Dockerfile の生成
//!
//! ビルドディレクトリのマーカーファイルから種別を判定し、
//! 組み込みテンプレートを Tera で展開して Dockerfile を作ります。

use crate::error::{BuildError, BuildResult};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

const NODE_TEMPLATE: &str = r#"FROM node:{{ runtime_version }}-alpine AS build
WORKDIR /app
COPY package*.json ./
RUN npm ci --omit=dev
COPY . .

FROM node:{{ runtime_version }}-alpine
ENV NODE_ENV=production
WORKDIR /app
COPY --from=build /app /app
USER node
LABEL org.opencontainers.image.title="{{ app_name }}"
CMD ["npm", "start"]
"#;

const GO_TEMPLATE: &str = r#"FROM golang:{{ runtime_version }} AS build
WORKDIR /src
COPY go.mod go.sum* ./
RUN go mod download
COPY . .
RUN CGO_ENABLED=0 go build -o /out/{{ app_name }} .

FROM gcr.io/distroless/static-debian12
COPY --from=build /out/{{ app_name }} /app
LABEL org.opencontainers.image.title="{{ app_name }}"
ENTRYPOINT ["/app"]
"#;

/// Dockerfile の内容を提供するもの
///
/// ビルドコンテキストの組み立て時に、生成 Dockerfile を使う場合だけ呼ばれます。
pub trait DockerfileSource: Send + Sync {
    fn dockerfile(&self) -> BuildResult<Vec<u8>>;
}

/// 対応しているプロジェクト種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectKind {
    Node,
    Go,
}

impl ProjectKind {
    /// マーカーファイルから種別を判定
    pub fn detect(directory: &Path) -> Option<Self> {
        if directory.join("package.json").is_file() {
            Some(ProjectKind::Node)
        } else if directory.join("go.mod").is_file() {
            Some(ProjectKind::Go)
        } else {
            None
        }
    }

    pub fn default_runtime_version(&self) -> &'static str {
        match self {
            ProjectKind::Node => "20",
            ProjectKind::Go => "1.22",
        }
    }

    fn template(&self) -> &'static str {
        match self {
            ProjectKind::Node => NODE_TEMPLATE,
            ProjectKind::Go => GO_TEMPLATE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Project {
    name: String,
    directory: PathBuf,
    kind: Option<ProjectKind>,
    runtime_version: Option<String>,
}

impl Project {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>, kind: ProjectKind) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            kind: Some(kind),
            runtime_version: None,
        }
    }

    /// ディレクトリの内容から種別を判定して作成
    ///
    /// 判定できなくても作成でき、Dockerfile を生成しようとした時点でエラーになります。
    pub fn detect(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        let directory = directory.into();
        let kind = ProjectKind::detect(&directory);
        tracing::debug!("Detected {:?} project in {}", kind, directory.display());
        Self {
            name: name.into(),
            directory,
            kind,
            runtime_version: None,
        }
    }

    /// ランタイムバージョンを上書き
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn kind(&self) -> Option<ProjectKind> {
        self.kind
    }

    /// 上書きがなければ種別ごとのデフォルト
    pub fn runtime_version(&self) -> Option<&str> {
        self.runtime_version
            .as_deref()
            .or_else(|| self.kind.map(|kind| kind.default_runtime_version()))
    }

    /// テンプレートを展開して Dockerfile を文字列で返す
    pub fn render_dockerfile(&self) -> BuildResult<String> {
        let kind = self.kind.ok_or_else(|| {
            BuildError::Dockerfile(format!(
                "cannot detect project type in {} (expected package.json or go.mod)",
                self.directory.display()
            ))
        })?;

        let mut context = Context::new();
        context.insert("app_name", &self.name);
        context.insert(
            "runtime_version",
            self.runtime_version()
                .unwrap_or_else(|| kind.default_runtime_version()),
        );

        Tera::one_off(kind.template(), &context, false)
            .map_err(|e| BuildError::Dockerfile(format!("rendering {:?} template: {}", kind, e)))
    }
}

impl DockerfileSource for Project {
    fn dockerfile(&self) -> BuildResult<Vec<u8>> {
        self.render_dockerfile().map(String::into_bytes)
    }
}
