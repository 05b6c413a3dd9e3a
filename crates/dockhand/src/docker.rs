use colored::Colorize;
use dockhand_build::{BollardEngine, ContainerEngine};
use std::sync::Arc;

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn connect() -> anyhow::Result<Arc<dyn ContainerEngine>> {
    match BollardEngine::connect().await {
        Ok(engine) => Ok(Arc::new(engine)),
        Err(e) => {
            eprintln!();
            eprintln!("{}", "✗ Docker接続エラー".red().bold());
            eprintln!();
            eprintln!("{}", "原因:".yellow());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!("{}", "解決方法:".yellow());
            eprintln!("  • Dockerが起動しているか確認してください");
            eprintln!("  • DOCKER_HOST の値を確認してください");
            eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}
