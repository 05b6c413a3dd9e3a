//! ビルド・プッシュの出力先

use crate::engine::EngineMessage;
use colored::Colorize;
use std::io::Write;

/// エンジンから流れてくるメッセージの出力先
pub trait LogSink: Send {
    fn write_message(&mut self, message: &EngineMessage);
}

/// ターミナルへ出力する
#[derive(Debug, Default)]
pub struct ConsoleSink {
    last_status: String,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogSink for ConsoleSink {
    fn write_message(&mut self, message: &EngineMessage) {
        if let Some(stream) = &message.stream {
            // ビルドステップの出力はそのまま
            print!("{}", stream);
            std::io::stdout().flush().ok();
        }

        if let Some(status) = &message.status {
            match message.progress.as_deref() {
                Some(progress) => println!("  {} {}", status.cyan(), progress),
                // 進捗なしの同じステータスが続く場合は省略（レイヤーごとのPreparing等）
                None if *status == self.last_status => {}
                None => println!("  {}", status.cyan()),
            }
            self.last_status.clone_from(status);
        }

        if let Some(error) = &message.error {
            eprintln!("  {} {}", "✗".red().bold(), error.red());
        }
    }
}
