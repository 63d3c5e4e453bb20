//! 日志系统模块
//!
//! 提供结构化日志配置和初始化功能

use crate::config::GlobalConfig;
use log::LevelFilter;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志是否已初始化
static LOGGING_INITIALIZED: OnceLock<Mutex<bool>> = OnceLock::new();

fn logging_state() -> MutexGuard<'static, bool> {
    LOGGING_INITIALIZED
        .get_or_init(|| Mutex::new(false))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径（可选），设置后不再输出到控制台
    pub file_path: Option<PathBuf>,
    /// 是否使用JSON格式
    pub json_format: bool,
    /// 模块级别日志控制
    pub module_levels: HashMap<String, LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        // HTTP和TLS依赖在debug级别下过于嘈杂
        let module_levels = ["hyper", "hyper_util", "reqwest", "rustls", "h2"]
            .into_iter()
            .map(|module| (module.to_string(), LevelFilter::Warn))
            .collect();

        Self {
            level: LevelFilter::Info,
            file_path: None,
            json_format: false,
            module_levels,
        }
    }
}

impl LogConfig {
    /// 合并命令行和配置文件中的日志设置
    ///
    /// 命令行优先，其次是配置文件，最后是默认值
    ///
    /// # 参数
    /// * `cli_level` - 命令行指定的级别
    /// * `cli_file` - 命令行指定的日志文件
    /// * `global` - 配置文件的全局配置（可能不存在）
    /// * `json_format` - 是否输出JSON
    pub fn resolve(
        cli_level: Option<LevelFilter>,
        cli_file: Option<PathBuf>,
        global: Option<&GlobalConfig>,
        json_format: bool,
    ) -> Self {
        let level = cli_level
            .or_else(|| global.and_then(|g| parse_level(&g.log_level)))
            .unwrap_or(LevelFilter::Info);
        let file_path = cli_file.or_else(|| global.and_then(|g| g.log_file.clone()));

        Self {
            level,
            file_path,
            json_format,
            ..Self::default()
        }
    }
}

/// 解析日志级别字符串
pub fn parse_level(level: &str) -> Option<LevelFilter> {
    match level.trim().to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 全局只初始化一次，之后的调用直接返回成功
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `Result<LoggingSystem, anyhow::Error>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let mut initialized = logging_state();
        if *initialized {
            return Ok(Self { config });
        }

        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(&config)?;
        *initialized = true;

        Ok(Self { config })
    }

    /// 当前实例使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 构建环境过滤器，`RUST_LOG` 优先
    fn build_env_filter(config: &LogConfig) -> EnvFilter {
        let mut env_filter = EnvFilter::builder()
            .with_default_directive(Self::convert_level_to_directive(config.level))
            .from_env_lossy();

        for (module, level) in &config.module_levels {
            match format!("{}={}", module, Self::level_to_string(*level)).parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(e) => eprintln!("忽略无效的模块日志级别 {module}: {e}"),
            }
        }

        env_filter
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = Self::build_env_filter(config);

        let result = if let Some(file_path) = &config.file_path {
            let file = open_log_file(file_path)?;

            let file_layer = if config.json_format {
                fmt::layer()
                    .json()
                    .with_writer(file)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(file)
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_ansi(false)
                    .with_target(true)
                    .boxed()
            };
            registry().with(env_filter).with(file_layer).try_init()
        } else {
            let fmt_layer = if config.json_format {
                fmt::layer()
                    .json()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_file(true)
                    .with_line_number(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_timer(fmt::time::ChronoUtc::rfc_3339())
                    .with_ansi(true)
                    .with_target(true)
                    .boxed()
            };
            registry().with(env_filter).with(fmt_layer).try_init()
        };

        match result {
            Ok(()) => {
                tracing::debug!("日志配置: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("already been set")
                    || error_msg.contains("already initialized")
                {
                    // 测试中其他用例可能已经安装了全局subscriber
                    tracing::debug!("日志系统已经初始化过了");
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> tracing_subscriber::filter::Directive {
        use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevel};
        match level {
            LevelFilter::Off => Directive::from(TracingLevel::OFF),
            LevelFilter::Error => Directive::from(tracing::Level::ERROR),
            LevelFilter::Warn => Directive::from(tracing::Level::WARN),
            LevelFilter::Info => Directive::from(tracing::Level::INFO),
            LevelFilter::Debug => Directive::from(tracing::Level::DEBUG),
            LevelFilter::Trace => Directive::from(tracing::Level::TRACE),
        }
    }

    /// 将 log::LevelFilter 转换为字符串
    fn level_to_string(level: LevelFilter) -> &'static str {
        match level {
            LevelFilter::Off => "off",
            LevelFilter::Error => "error",
            LevelFilter::Warn => "warn",
            LevelFilter::Info => "info",
            LevelFilter::Debug => "debug",
            LevelFilter::Trace => "trace",
        }
    }
}

/// 以追加方式打开日志文件，必要时创建上级目录
fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("创建日志目录失败 {}: {}", parent.display(), e))?;
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("打开日志文件失败 {}: {}", path.display(), e))
}
