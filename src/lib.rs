//! Uptyne - 监控检测引擎
//!
//! 周期性探测注册的端点并记录结果，支持：
//! - HTTP/HTTPS、TCP、Ping协议探测
//! - TLS证书、DNS和WHOIS域名检测
//! - 按监控项间隔的到期检测调度
//! - 可用率统计
//! - 短信和聊天webhook告警
//! - 配置热重载

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod health;
pub mod logging;
pub mod notification;
pub mod recorder;
pub mod service;
pub mod store;
pub mod web;

// 重新导出主要类型
pub use config::{Config, GlobalConfig};
pub use error::UptyneError;
pub use health::{CheckResult, CheckScheduler, CheckStatus, PassSummary, ProtocolProbe};
pub use recorder::{MonitorSummary, Recorder};
pub use store::{MemoryStore, Monitor, MonitorStore};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
