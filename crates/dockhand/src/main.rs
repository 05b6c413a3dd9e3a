mod commands;
mod docker;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::ProjectArgs;
use dockhand_build::BuildError;

#[derive(Parser)]
#[command(name = "dockhand")]
#[command(about = "プロジェクトからコンテナイメージをビルドし、レジストリへプッシュします", long_about = None)]
struct Cli {
    #[command(flatten)]
    project: ProjectArgs,
    /// 詳細ログを表示
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルド
    Build {
        /// ビルド後にレジストリへプッシュする
        #[arg(long)]
        push: bool,
    },
    /// ビルド済みイメージにリモートタグを付けてプッシュ
    Push,
    /// 自動生成されるDockerfileを表示
    Dockerfile,
    /// バージョン情報を表示
    Version,
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Commands::Version) {
        println!("dockhand {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = dockhand_config::load_settings()?;
    let config = cli.project.resolve(&settings)?;
    tracing::debug!("Resolved project config: {:?}", config.image());

    match cli.command {
        Commands::Build { push } => commands::build::handle_build_command(&config, push).await,
        Commands::Push => commands::push::handle_push_command(&config).await,
        Commands::Dockerfile => commands::dockerfile::handle_dockerfile_command(&config),
        Commands::Version => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        let message = match e.downcast_ref::<BuildError>() {
            Some(build_error) => build_error.user_message(),
            None => format!("{:#}", e),
        };
        eprintln!();
        eprintln!("{} {}", "✗".red().bold(), message);
        std::process::exit(1);
    }
}
