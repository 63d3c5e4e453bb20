//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use crate::domain::checker::DomainSettings;
use crate::error::NotificationError;
use crate::health::checker::{ProbeSettings, DEFAULT_USER_AGENT};
use crate::health::scheduler::EngineSettings;
use crate::notification::dispatcher::{AlertPolicy, DispatcherConfig};
use crate::notification::template::{
    AlertTemplates, DEFAULT_CHAT_PRETEXT_TEMPLATE, DEFAULT_CHAT_TEXT_TEMPLATE,
    DEFAULT_SMS_TEMPLATE,
};
use crate::store::models::{Monitor, User};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

/// 并发检测数上限
pub const MAX_CONCURRENT_CHECKS_LIMIT: usize = 50;

/// 单项超时上限（秒）
pub const MAX_TIMEOUT_SECONDS: u64 = 3600;

/// 每个监控项保留的历史记录条数上限
pub const MAX_HISTORY_RETENTION: usize = 100_000;

/// 主配置结构，包含全局配置、用户和监控项
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// 全局配置项
    #[serde(default)]
    pub global: GlobalConfig,
    /// 用户列表
    #[serde(default)]
    pub users: Vec<User>,
    /// 监控项列表
    #[serde(default)]
    pub monitors: Vec<Monitor>,
}

/// 全局配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 日志文件路径，未配置时输出到控制台
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// 最大并发检测数
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_checks: usize,
    /// HTTP探测超时（秒）
    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
    /// TCP探测超时（毫秒）
    #[serde(default = "default_probe_timeout_ms")]
    pub tcp_timeout_ms: u64,
    /// Ping探测超时（毫秒）
    #[serde(default = "default_probe_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// WHOIS查询超时（秒）
    #[serde(default = "default_whois_timeout")]
    pub whois_timeout_seconds: u64,
    /// TLS握手超时（秒）
    #[serde(default = "default_domain_timeout")]
    pub tls_timeout_seconds: u64,
    /// DNS解析超时（秒）
    #[serde(default = "default_domain_timeout")]
    pub dns_timeout_seconds: u64,
    /// 域名检测间隔（小时）
    #[serde(default = "default_domain_interval")]
    pub domain_check_interval_hours: u32,
    /// HTTP探测的User-Agent
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// 告警策略
    #[serde(default)]
    pub alert_policy: AlertPolicy,
    /// 可用率统计窗口（最近的检测条数）
    #[serde(default = "default_uptime_window")]
    pub uptime_window: usize,
    /// 每个监控项保留的最近记录条数
    #[serde(default = "default_history_retention")]
    pub history_retention: usize,
    /// 检测历史快照文件
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    /// 短信服务配置
    #[serde(default)]
    pub sms: Option<SmsConfig>,
    /// HTTP服务配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 告警文本模板
    #[serde(default)]
    pub templates: TemplateConfig,
}

/// Twilio兼容的短信服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmsConfig {
    /// 账号SID
    pub account_sid: String,
    /// 认证令牌
    pub auth_token: String,
    /// 发送号码
    pub from_number: String,
    /// 接口地址
    #[serde(default = "default_sms_api_base")]
    pub api_base: String,
}

/// HTTP服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 是否由服务自身定时触发检测
    #[serde(default)]
    pub self_trigger: bool,
    /// 自触发间隔（秒）
    #[serde(default = "default_tick_seconds")]
    pub tick_seconds: u64,
}

/// 告警文本模板，未配置的使用内置模板
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateConfig {
    /// 短信正文
    #[serde(default)]
    pub sms: Option<String>,
    /// 聊天消息标题
    #[serde(default)]
    pub chat_text: Option<String>,
    /// 聊天附件前言
    #[serde(default)]
    pub chat_pretext: Option<String>,
}

impl TemplateConfig {
    /// 编译模板
    pub fn build(&self) -> Result<AlertTemplates, NotificationError> {
        AlertTemplates::new(
            self.sms.as_deref().unwrap_or(DEFAULT_SMS_TEMPLATE),
            self.chat_text.as_deref().unwrap_or(DEFAULT_CHAT_TEXT_TEMPLATE),
            self.chat_pretext
                .as_deref()
                .unwrap_or(DEFAULT_CHAT_PRETEXT_TEMPLATE),
        )
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_file: None,
            max_concurrent_checks: default_max_concurrent(),
            http_timeout_seconds: default_http_timeout(),
            tcp_timeout_ms: default_probe_timeout_ms(),
            ping_timeout_ms: default_probe_timeout_ms(),
            whois_timeout_seconds: default_whois_timeout(),
            tls_timeout_seconds: default_domain_timeout(),
            dns_timeout_seconds: default_domain_timeout(),
            domain_check_interval_hours: default_domain_interval(),
            user_agent: default_user_agent(),
            alert_policy: AlertPolicy::default(),
            uptime_window: default_uptime_window(),
            history_retention: default_history_retention(),
            state_file: None,
            sms: None,
            server: ServerConfig::default(),
            templates: TemplateConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            self_trigger: false,
            tick_seconds: default_tick_seconds(),
        }
    }
}

impl GlobalConfig {
    /// 协议探测参数
    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            http_timeout: Duration::from_secs(self.http_timeout_seconds),
            tcp_timeout: Duration::from_millis(self.tcp_timeout_ms),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            user_agent: self.user_agent.clone(),
        }
    }

    /// 域名检测参数
    pub fn domain_settings(&self) -> DomainSettings {
        DomainSettings {
            tls_timeout: Duration::from_secs(self.tls_timeout_seconds),
            dns_timeout: Duration::from_secs(self.dns_timeout_seconds),
            whois_timeout: Duration::from_secs(self.whois_timeout_seconds),
        }
    }

    /// 域名检测间隔
    pub fn domain_check_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.domain_check_interval_hours))
    }

    /// 调度参数
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_concurrent_checks: self.max_concurrent_checks,
            domain_check_interval: self.domain_check_interval(),
            ..EngineSettings::default()
        }
    }

    /// 告警分发器配置
    pub fn dispatcher_config(&self) -> Result<DispatcherConfig, NotificationError> {
        Ok(DispatcherConfig {
            policy: self.alert_policy,
            sms: self.sms.clone(),
            request_timeout: Duration::from_secs(self.http_timeout_seconds),
            templates: self.templates.build()?,
        })
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_concurrent() -> usize {
    20
}
fn default_http_timeout() -> u64 {
    30
}
fn default_probe_timeout_ms() -> u64 {
    5000
}
fn default_whois_timeout() -> u64 {
    15
}
fn default_domain_timeout() -> u64 {
    10
}
fn default_domain_interval() -> u32 {
    24
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_uptime_window() -> usize {
    100
}
fn default_history_retention() -> usize {
    1440
}
fn default_sms_api_base() -> String {
    "https://api.twilio.com".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_tick_seconds() -> u64 {
    60
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let global = &config.global;

    if global.max_concurrent_checks == 0 || global.max_concurrent_checks > MAX_CONCURRENT_CHECKS_LIMIT
    {
        return Err(format!(
            "最大并发检测数必须在1-{}之间: {}",
            MAX_CONCURRENT_CHECKS_LIMIT, global.max_concurrent_checks
        ));
    }

    let max_ms = MAX_TIMEOUT_SECONDS * 1000;
    for (name, value, max) in [
        ("http_timeout_seconds", global.http_timeout_seconds, MAX_TIMEOUT_SECONDS),
        ("tcp_timeout_ms", global.tcp_timeout_ms, max_ms),
        ("ping_timeout_ms", global.ping_timeout_ms, max_ms),
        ("whois_timeout_seconds", global.whois_timeout_seconds, MAX_TIMEOUT_SECONDS),
        ("tls_timeout_seconds", global.tls_timeout_seconds, MAX_TIMEOUT_SECONDS),
        ("dns_timeout_seconds", global.dns_timeout_seconds, MAX_TIMEOUT_SECONDS),
    ] {
        if value == 0 {
            return Err(format!("超时时间不能为0: {name}"));
        }
        if value > max {
            return Err(format!("超时时间超出上限{max}: {name} = {value}"));
        }
    }

    if global.domain_check_interval_hours == 0 {
        return Err("域名检测间隔不能为0".to_string());
    }

    if global.uptime_window == 0 {
        return Err("可用率统计窗口不能为0".to_string());
    }

    if global.history_retention == 0 || global.history_retention > MAX_HISTORY_RETENTION {
        return Err(format!(
            "历史保留条数必须在1-{}之间: {}",
            MAX_HISTORY_RETENTION, global.history_retention
        ));
    }
    if global.history_retention < global.uptime_window {
        return Err(format!(
            "历史保留条数({})不能小于可用率统计窗口({})",
            global.history_retention, global.uptime_window
        ));
    }

    // 验证日志级别
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&global.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            global.log_level, valid_log_levels
        ));
    }

    if let Some(sms) = &global.sms {
        if sms.account_sid.trim().is_empty() || sms.auth_token.trim().is_empty() {
            return Err("短信服务的account_sid和auth_token不能为空".to_string());
        }
        if !crate::store::models::is_e164(&sms.from_number) {
            return Err(format!("短信发送号码不是E.164格式: {}", sms.from_number));
        }
    }

    if global.server.bind_address.is_empty() {
        return Err("HTTP服务绑定地址不能为空".to_string());
    }
    if global.server.tick_seconds == 0 {
        return Err("自触发间隔不能为0秒".to_string());
    }

    global
        .templates
        .build()
        .map_err(|e| format!("告警模板无效: {e}"))?;

    // 验证用户
    let mut user_ids = HashSet::new();
    for user in &config.users {
        if user.id.trim().is_empty() {
            return Err("用户ID不能为空".to_string());
        }
        if !user_ids.insert(user.id.as_str()) {
            return Err(format!("用户ID重复: {}", user.id));
        }
        user.alerts
            .validate()
            .map_err(|e| format!("用户 {} 的告警设置无效: {}", user.id, e))?;
    }

    // 验证监控项
    let mut monitor_ids = HashSet::new();
    for monitor in &config.monitors {
        monitor.validate()?;
        if !monitor_ids.insert(monitor.id.as_str()) {
            return Err(format!("监控项ID重复: {}", monitor.id));
        }
        if !user_ids.contains(monitor.user_id.as_str()) {
            return Err(format!(
                "监控项 {} 引用了不存在的用户: {}",
                monitor.id, monitor.user_id
            ));
        }
    }

    Ok(())
}
