//! Uptyne 主程序入口

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use uptyne::cli::{command_for, Args, Commands};
use uptyne::config::{Config, ConfigLoader, TomlConfigLoader};
use uptyne::logging::{LogConfig, LoggingSystem};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    let config = load_config_for_logging(&args).await;
    let log_config = LogConfig::resolve(
        args.log_level.map(Into::into),
        args.log_file.clone(),
        config.as_ref().map(|c| &c.global),
        args.json_logs,
    );
    let logging = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("{} v{} 启动", uptyne::APP_NAME, uptyne::VERSION);
    if let Some(path) = &logging.config().file_path {
        info!("日志写入文件: {}", path.display());
    }

    if let Err(e) = command_for(&args.command).execute(&args).await {
        error!("命令执行失败: {:#}", e);
        eprintln!("错误: {e:#}");
        std::process::exit(1);
    }

    Ok(())
}

/// 读取配置文件中的日志设置
async fn load_config_for_logging(args: &Args) -> Option<Config> {
    // 这些命令不需要配置文件
    if matches!(
        args.command,
        Commands::Init { .. } | Commands::Version { .. }
    ) {
        return None;
    }

    let path = args.get_config_path();
    if !path.exists() {
        return None;
    }

    // 日志尚未初始化，这里的失败留给命令本身报告
    TomlConfigLoader::new(true).load_from_file(&path).await.ok()
}
