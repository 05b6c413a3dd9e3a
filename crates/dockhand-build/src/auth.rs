//! レジストリ認証処理
//!
//! プッシュ時の認証情報（`X-Registry-Auth` ヘッダ値）のエンコードと、
//! 明示的な指定がない場合の Docker config.json からの取得を扱います。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use bollard::auth::DockerCredentials;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// レジストリへの認証情報
///
/// プッシュのたびに作り直し、ディスクには保存しません。
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serveraddress: Option<String>,
}

impl std::fmt::Debug for RegistryCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredential")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("serveraddress", &self.serveraddress)
            .finish()
    }
}

impl RegistryCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            serveraddress: None,
        }
    }

    pub fn with_server_address(mut self, server: impl Into<String>) -> Self {
        self.serveraddress = Some(server.into());
        self
    }

    /// ログ表示用のユーザー名
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// JSON化して base64url（パディングあり）でエンコード
    pub fn encode(&self) -> BuildResult<String> {
        let json = serde_json::to_vec(self).map_err(|e| BuildError::AuthFailed {
            registry: self.serveraddress.clone().unwrap_or_default(),
            message: format!("Failed to serialize credentials: {}", e),
        })?;
        Ok(URL_SAFE.encode(json))
    }

    /// [`encode`](Self::encode) の逆変換
    ///
    /// 空文字列や `{}` は認証なしとして `None` を返します。
    pub fn decode(header: &str) -> BuildResult<Option<Self>> {
        if header.is_empty() {
            return Ok(None);
        }

        let json = URL_SAFE.decode(header).map_err(|e| BuildError::AuthFailed {
            registry: String::new(),
            message: format!("Failed to decode registry auth header: {}", e),
        })?;
        let credential: Self = serde_json::from_slice(&json).map_err(|e| BuildError::AuthFailed {
            registry: String::new(),
            message: format!("Invalid registry auth header: {}", e),
        })?;

        if credential == Self::default() {
            Ok(None)
        } else {
            Ok(Some(credential))
        }
    }
}

impl From<RegistryCredential> for DockerCredentials {
    fn from(credential: RegistryCredential) -> Self {
        DockerCredentials {
            username: credential.username,
            password: credential.password,
            serveraddress: credential.serveraddress,
            ..Default::default()
        }
    }
}

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HelperResponse {
    username: String,
    secret: String,
}

/// Docker config.json から認証情報を探す
#[derive(Debug)]
pub struct RegistryAuth {
    config_path: PathBuf,
}

impl Default for RegistryAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryAuth {
    /// `$DOCKER_CONFIG/config.json`、なければ `~/.docker/config.json` を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// イメージ名からレジストリの認証情報を取得
    ///
    /// `auths` セクション、次に `credsStore` の helper を確認します。
    /// config.json がない場合や該当がない場合は `Ok(None)`。
    pub fn get_credentials(&self, image: &str) -> BuildResult<Option<RegistryCredential>> {
        let registry = extract_registry(image);

        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        if let Some(auth_b64) = config.auths.get(&registry).and_then(|e| e.auth.as_ref())
            && let Some(credential) = decode_basic_auth(auth_b64, &registry)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(credential));
        }

        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            match run_helper(helper, &registry) {
                Ok(Some(credential)) => return Ok(Some(credential)),
                Ok(None) => {}
                Err(e) => tracing::debug!("{}", e),
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let failed = |message: String| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message,
        };

        let content = std::fs::read_to_string(&self.config_path)
            .map_err(|e| failed(format!("Failed to read config.json: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| failed(format!("Failed to parse config.json: {}", e)))
    }
}

/// イメージ名からレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    match image.split_once('/') {
        Some((first, _)) if first.contains('.') || first.contains(':') => first.to_string(),
        _ => "docker.io".to_string(),
    }
}

/// `auths` の "username:password" をデコード
fn decode_basic_auth(auth_b64: &str, registry: &str) -> BuildResult<Option<RegistryCredential>> {
    let failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let decoded = STANDARD
        .decode(auth_b64)
        .map_err(|e| failed(format!("Failed to decode auth: {}", e)))?;
    let auth_str =
        String::from_utf8(decoded).map_err(|e| failed(format!("Invalid UTF-8 in auth: {}", e)))?;

    Ok(auth_str.split_once(':').map(|(username, password)| {
        RegistryCredential::new(username, password).with_server_address(registry)
    }))
}

/// `docker-credential-<helper> get` を実行
fn run_helper(helper: &str, registry: &str) -> BuildResult<Option<RegistryCredential>> {
    let helper_cmd = format!("docker-credential-{}", helper);
    let failed = |message: String| BuildError::AuthFailed {
        registry: registry.to_string(),
        message,
    };

    let mut child = Command::new(&helper_cmd)
        .arg("get")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| failed(format!("Failed to run {}: {}", helper_cmd, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(registry.as_bytes()).ok();
    }

    let output = child
        .wait_with_output()
        .map_err(|e| failed(format!("Credential helper failed: {}", e)))?;

    if !output.status.success() {
        tracing::debug!(
            "Credential helper returned error for {}: {}",
            registry,
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(None);
    }

    let response: HelperResponse = serde_json::from_slice(&output.stdout)
        .map_err(|e| failed(format!("Failed to parse credential helper response: {}", e)))?;

    Ok(Some(
        RegistryCredential::new(response.username, response.secret).with_server_address(registry),
    ))
}
