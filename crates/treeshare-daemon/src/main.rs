//! Treeshare Daemon
//!
//! HTTP 目录共享服务，负责：
//! - 目录浏览
//! - 文件上传
//! - 文件下载 / 目录实时打包下载

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use treeshare_core::{LogLevel, ServerSettings, TransferServer};

#[derive(Parser, Debug)]
#[command(name = "treeshare", version, about = "通过 HTTP 共享目录树")]
struct Cli {
    /// 配置文件路径 (默认: ~/.config/treeshare/settings.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 监听地址，例如 127.0.0.1:8000
    #[arg(short, long)]
    listen: Option<String>,
    /// 上传根目录
    #[arg(short, long)]
    uploads_dir: Option<PathBuf>,
    /// 日志级别 (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<LogLevel>,
}

impl Cli {
    /// 读取配置文件，再用命令行参数覆盖
    fn settings(&self) -> ServerSettings {
        let mut settings = match &self.config {
            Some(path) => ServerSettings::load_from(path),
            None => ServerSettings::load(),
        };
        if let Some(listen) = &self.listen {
            settings.listen_addr.clone_from(listen);
        }
        if let Some(dir) = &self.uploads_dir {
            settings.uploads_dir.clone_from(dir);
        }
        if let Some(level) = self.log_level {
            settings.log_level = level;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings();

    // 桥接 log crate（treeshare-core 使用）到 tracing
    let _ = tracing_log::LogTracer::init();

    // 初始化日志
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.default_directive())),
        )
        .try_init();

    tracing::info!("Treeshare Daemon starting...");
    tracing::debug!("Settings: {:?}", settings);

    let server = TransferServer::new(settings);
    server.run_until(shutdown_signal()).await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
