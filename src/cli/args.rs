//! 命令行参数定义
//!
//! 使用clap定义应用程序的命令行接口

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Uptyne - 监控检测引擎
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uptyne",
    version = crate::VERSION,
    about = crate::APP_DESCRIPTION,
    long_about = None
)]
pub struct Args {
    /// 配置文件路径
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径",
        env = "UPTYNE_CONFIG",
        global = true
    )]
    pub config: Option<PathBuf>,

    /// 日志级别，未指定时使用配置文件中的级别
    #[arg(
        short,
        long,
        value_enum,
        help = "日志级别",
        env = "UPTYNE_LOG_LEVEL",
        global = true
    )]
    pub log_level: Option<LogLevel>,

    /// 日志文件，未指定时使用配置文件中的设置
    #[arg(
        long,
        value_name = "FILE",
        help = "日志文件路径",
        env = "UPTYNE_LOG_FILE",
        global = true
    )]
    pub log_file: Option<PathBuf>,

    /// 以JSON格式输出日志
    #[arg(long, help = "以JSON格式输出日志", env = "UPTYNE_JSON_LOGS", global = true)]
    pub json_logs: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

/// 日志级别枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// 子命令定义
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// 启动HTTP服务，提供触发端点和查询端点
    Serve {
        /// 由服务自身定时触发检测
        #[arg(long, help = "由服务自身定时触发检测")]
        self_trigger: bool,
    },

    /// 执行一次协议检测调度
    CheckMonitors {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 执行一次域名检测调度
    CheckDomains {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 探测单个URL，不写入记录
    Probe {
        /// 目标URL（http(s)://、tcp://host:port 或 ping://host）
        #[arg(value_name = "URL", help = "目标URL")]
        url: String,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 检测单个域名的证书、DNS和WHOIS
    Domain {
        /// 域名或URL
        #[arg(value_name = "DOMAIN", help = "域名或URL")]
        domain: String,

        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },

    /// 验证配置文件
    Validate {
        /// 是否显示详细信息
        #[arg(short, long, help = "显示详细信息")]
        verbose: bool,
    },

    /// 向用户启用的通道发送测试告警
    TestAlert {
        /// 用户ID
        #[arg(short, long, value_name = "ID", help = "用户ID")]
        user: String,
    },

    /// 初始化配置文件
    Init {
        /// 配置文件路径
        #[arg(value_name = "FILE", help = "配置文件路径", default_value = "uptyne.toml")]
        config_path: PathBuf,

        /// 是否覆盖现有文件
        #[arg(short, long, help = "覆盖现有文件")]
        force: bool,
    },

    /// 显示版本信息
    Version {
        /// 输出格式
        #[arg(short, long, value_enum, default_value = "text", help = "输出格式")]
        format: OutputFormat,
    },
}

/// 输出格式枚举
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// 文本格式
    Text,
    /// JSON格式
    Json,
}

impl Args {
    /// 获取配置文件路径
    pub fn get_config_path(&self) -> PathBuf {
        crate::config::resolve_config_path(self.config.as_deref())
    }
}
