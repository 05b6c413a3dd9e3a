use super::ProjectConfig;

/// 自動生成される Dockerfile を表示
pub fn handle_dockerfile_command(config: &ProjectConfig) -> anyhow::Result<()> {
    let dockerfile = config.project().render_dockerfile()?;
    print!("{}", dockerfile);
    Ok(())
}
