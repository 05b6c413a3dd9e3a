use super::ProjectConfig;
use crate::docker;
use colored::Colorize;
use dockhand_build::{ConsoleSink, GENERATED_DOCKERFILE};

/// ビルドコマンドを処理
pub async fn handle_build_command(config: &ProjectConfig, push: bool) -> anyhow::Result<()> {
    let image = config.image();

    println!("{}", "Dockerイメージをビルド中...".green());
    println!(
        "  → Context: {}",
        config.directory.display().to_string().cyan()
    );
    if config.dockerfile_name == GENERATED_DOCKERFILE {
        println!("  → Dockerfile: {}", "(自動生成)".cyan());
    } else {
        println!("  → Dockerfile: {}", config.dockerfile_name.cyan());
    }
    println!("  → Image: {}", image.local_tag().cyan());

    let engine = docker::connect().await?;
    let service = config.service(engine);
    let mut sink = ConsoleSink::new();

    service.build(&mut sink).await?;
    println!();
    println!("  {} ビルド完了: {}", "✓".green(), image.local_tag().cyan());

    if push {
        let service = service.with_credential(config.credential()?);
        super::push::push_with(&service, &mut sink).await?;
    }

    Ok(())
}
