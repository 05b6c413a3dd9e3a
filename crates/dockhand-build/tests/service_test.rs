mod common;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use common::{FakeEngine, RecordingSink, StaticProject};
use dockhand_build::{
    BuildError, DockerImage, DockerService, EngineMessage, GENERATED_DOCKERFILE,
    RegistryCredential, ServiceSettings,
};
use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

fn service(engine: Arc<FakeEngine>, directory: &std::path::Path, dockerfile: &str) -> DockerService {
    let image = DockerImage::new("registry.example.com/team", "api", directory, Some("v1"));
    DockerService::new(
        engine,
        Arc::new(StaticProject(vec![b'x'; 42])),
        image,
        dockerfile,
    )
}

#[tokio::test]
async fn test_build_sends_merged_context() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("app.py"), "print('x')").unwrap();
    fs::write(temp_dir.path().join("requirements.txt"), "flask").unwrap();

    let engine = Arc::new(FakeEngine {
        build_messages: vec![
            EngineMessage::stream("Step 1/2 : FROM python\n"),
            EngineMessage::stream("Successfully built abc123\n"),
        ],
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    service(engine.clone(), temp_dir.path(), GENERATED_DOCKERFILE)
        .build(&mut sink)
        .await
        .unwrap();

    assert_eq!(engine.calls(), vec!["build api:v1"]);
    assert_eq!(sink.messages.len(), 2);

    let request = engine.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.dockerfile, GENERATED_DOCKERFILE);
    assert_eq!(request.tag, "api:v1");
    assert!(request.remove);

    let context = engine.last_context.lock().unwrap().clone().unwrap();
    let mut archive = tar::Archive::new(&context[..]);
    let mut sizes = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(entry.header().size().unwrap(), content.len() as u64);
        sizes.push(content.len() as u64);
    }
    assert_eq!(sizes.len(), 3);
    assert_eq!(sizes.iter().sum::<u64>(), 10 + 5 + 42);
}

#[tokio::test]
async fn test_build_does_not_call_engine_when_context_fails() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let mut sink = RecordingSink::default();

    let err = service(engine.clone(), &temp_dir.path().join("missing"), "Dockerfile")
        .build(&mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::ContextNotFound(_)));
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_build_error_message_fails_build() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("Dockerfile"), "FROM nothing").unwrap();

    let engine = Arc::new(FakeEngine {
        build_messages: vec![
            EngineMessage::stream("Step 1/1 : FROM nothing\n"),
            EngineMessage::error("pull access denied for nothing"),
        ],
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    let err = service(engine, temp_dir.path(), "Dockerfile")
        .build(&mut sink)
        .await
        .unwrap_err();

    match err {
        BuildError::BuildFailed(message) => assert!(message.contains("pull access denied")),
        other => panic!("unexpected error: {other:?}"),
    }
    // エラーメッセージもシンクに届く
    assert_eq!(sink.messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_build_times_out() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("Dockerfile"), "FROM alpine").unwrap();

    let engine = Arc::new(FakeEngine {
        build_delay: Duration::from_secs(6 * 60),
        build_messages: vec![EngineMessage::stream("done\n")],
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    let err = service(engine, temp_dir.path(), "Dockerfile")
        .build(&mut sink)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(matches!(err, BuildError::Timeout { limit, .. } if limit == Duration::from_secs(300)));
    assert!(sink.messages.is_empty());
}

#[tokio::test]
async fn test_push_tags_then_pushes_with_encoded_auth() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine {
        push_messages: vec![
            EngineMessage::status("Pushed"),
            EngineMessage::status("v1: digest: sha256:abc size: 528"),
        ],
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    service(engine.clone(), temp_dir.path(), "Dockerfile")
        .with_credential(RegistryCredential::new("deployer", "p@ss"))
        .push(&mut sink)
        .await
        .unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            "tag api:v1 registry.example.com/team/api:v1",
            "push registry.example.com/team/api:v1",
        ]
    );
    assert_eq!(sink.messages.len(), 2);

    let header = engine.last_auth.lock().unwrap().clone().unwrap();
    let json: serde_json::Value = serde_json::from_slice(&URL_SAFE.decode(header).unwrap()).unwrap();
    assert_eq!(json, serde_json::json!({"username": "deployer", "password": "p@ss"}));
}

/// ビルド番号のような数字だけのタグ
#[tokio::test]
async fn test_push_numeric_tag() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let mut sink = RecordingSink::default();

    let image = DockerImage::new("registry.example.com/team", "api", temp_dir.path(), Some("42"));
    DockerService::new(
        engine.clone(),
        Arc::new(StaticProject(Vec::new())),
        image,
        "Dockerfile",
    )
    .push(&mut sink)
    .await
    .unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            "tag api:42 registry.example.com/team/api:42",
            "push registry.example.com/team/api:42",
        ]
    );
}

#[tokio::test]
async fn test_push_registry_with_port() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let mut sink = RecordingSink::default();

    let image = DockerImage::new("localhost:5000", "api", temp_dir.path(), Some("2024"));
    DockerService::new(
        engine.clone(),
        Arc::new(StaticProject(Vec::new())),
        image,
        "Dockerfile",
    )
    .push(&mut sink)
    .await
    .unwrap();

    assert_eq!(
        engine.calls(),
        vec![
            "tag api:2024 localhost:5000/api:2024",
            "push localhost:5000/api:2024",
        ]
    );
}

#[tokio::test]
async fn test_tag_failure_prevents_push() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine {
        fail_tag: true,
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    let err = service(engine.clone(), temp_dir.path(), "Dockerfile")
        .push(&mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::TagFailed { .. }));
    assert_eq!(engine.calls(), vec!["tag api:v1 registry.example.com/team/api:v1"]);
}

#[tokio::test]
async fn test_push_stream_error() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine {
        push_messages: vec![
            EngineMessage::status("Preparing"),
            EngineMessage::error("denied: requested access to the resource is denied"),
        ],
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();

    let err = service(engine, temp_dir.path(), "Dockerfile")
        .push(&mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::PushFailed { message } if message.starts_with("denied")));
}

#[tokio::test(start_paused = true)]
async fn test_push_uses_configured_timeout() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine {
        push_delay: Duration::from_secs(30),
        ..FakeEngine::new()
    });
    let mut sink = RecordingSink::default();
    let settings = ServiceSettings {
        push_timeout: Duration::from_secs(10),
        ..Default::default()
    };

    let err = service(engine.clone(), temp_dir.path(), "Dockerfile")
        .with_settings(settings)
        .push(&mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Timeout { operation: "image push", .. }));
    // タグ付けは済んでいる
    assert_eq!(engine.calls().len(), 2);
}

#[tokio::test]
async fn test_push_requires_registry() {
    let temp_dir = tempdir().unwrap();
    let engine = Arc::new(FakeEngine::new());
    let image = DockerImage::new("", "api", temp_dir.path(), None);
    let service = DockerService::new(
        engine.clone(),
        Arc::new(StaticProject(Vec::new())),
        image,
        "Dockerfile",
    );

    let err = service.push(&mut RecordingSink::default()).await.unwrap_err();
    assert!(matches!(err, BuildError::InvalidConfig(_)));
    assert!(engine.calls().is_empty());
}

/// リンク切れを含むディレクトリでもビルドできる
#[cfg(unix)]
#[tokio::test]
async fn test_build_with_symlinks() {
    let temp_dir = tempdir().unwrap();
    fs::write(temp_dir.path().join("package.json"), "{}").unwrap();
    let bin = temp_dir.path().join("node_modules/.bin");
    fs::create_dir_all(&bin).unwrap();
    std::os::unix::fs::symlink("../left-pad/cli.js", bin.join("left-pad")).unwrap();
    std::os::unix::fs::symlink("package.json", temp_dir.path().join("manifest.json")).unwrap();

    let engine = Arc::new(FakeEngine::new());
    let mut sink = RecordingSink::default();

    service(engine.clone(), temp_dir.path(), GENERATED_DOCKERFILE)
        .build(&mut sink)
        .await
        .unwrap();

    assert_eq!(engine.calls(), vec!["build api:v1"]);

    let context = engine.last_context.lock().unwrap().clone().unwrap();
    let mut archive = tar::Archive::new(&context[..]);
    let mut links = Vec::new();
    for entry in archive.entries().unwrap() {
        let entry = entry.unwrap();
        if entry.header().entry_type() == tar::EntryType::Symlink {
            let path = entry.path().unwrap().display().to_string();
            let target = entry.link_name().unwrap().unwrap().display().to_string();
            links.push((path, target));
        }
    }
    links.sort();

    assert_eq!(
        links,
        vec![
            ("manifest.json".to_string(), "package.json".to_string()),
            (
                "node_modules/.bin/left-pad".to_string(),
                "../left-pad/cli.js".to_string()
            ),
        ]
    );
}
