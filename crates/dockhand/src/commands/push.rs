use super::ProjectConfig;
use crate::docker;
use colored::Colorize;
use dockhand_build::{ConsoleSink, DockerService, LogSink};

/// プッシュコマンドを処理
pub async fn handle_push_command(config: &ProjectConfig) -> anyhow::Result<()> {
    if config.registry.is_empty() {
        anyhow::bail!("プッシュ先のレジストリが指定されていません（--registry または DOCKHAND_REGISTRY）");
    }

    let engine = docker::connect().await?;
    let service = config.service(engine).with_credential(config.credential()?);
    push_with(&service, &mut ConsoleSink::new()).await
}

pub(crate) async fn push_with(service: &DockerService, sink: &mut dyn LogSink) -> anyhow::Result<()> {
    let remote_tag = service.image().remote_tag();

    println!();
    println!("{}", "📤 イメージをプッシュ中...".blue().bold());
    println!("  → {}", remote_tag.cyan());

    service.push(sink).await?;

    println!("  {} {}", "✓".green(), remote_tag.cyan());
    Ok(())
}
