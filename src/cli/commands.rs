//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::types::{Config, GlobalConfig};
use crate::config::{ConfigLoader, TomlConfigLoader};
use crate::domain::{DomainCheckResult, DomainChecker};
use crate::health::result::{CheckResult, ProbeOutcome};
use crate::health::{PassSummary, ProbeSet, ProtocolProbe};
use crate::notification::{AlertDispatcher, AlertPayload};
use crate::service::ServiceLauncher;
use crate::store::Monitor;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// 配置文件模板
const CONFIG_TEMPLATE: &str = include_str!("../../demos/uptyne.toml");

/// 证书到期提醒的提前天数
const SSL_EXPIRY_WARNING_DAYS: i64 = 30;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 按子命令选择处理器
pub fn command_for(commands: &Commands) -> Box<dyn Command> {
    match commands {
        Commands::Serve { .. } => Box::new(ServeCommand),
        Commands::CheckMonitors { .. } => Box::new(CheckMonitorsCommand),
        Commands::CheckDomains { .. } => Box::new(CheckDomainsCommand),
        Commands::Probe { .. } => Box::new(ProbeCommand),
        Commands::Domain { .. } => Box::new(DomainCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::TestAlert { .. } => Box::new(TestAlertCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    }
}

/// 加载配置文件
async fn load_config(args: &Args) -> Result<Config> {
    ServiceLauncher::load_and_validate_config(&args.get_config_path()).await
}

/// 配置文件存在时加载它，否则使用默认全局配置
async fn load_global_or_default(args: &Args) -> Result<GlobalConfig> {
    let path = args.get_config_path();
    if path.exists() {
        Ok(load_config(args).await?.global)
    } else {
        Ok(GlobalConfig::default())
    }
}

/// 启动服务命令
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Serve { self_trigger } = &args.command else {
            return Ok(());
        };

        let config_path = args.get_config_path();
        let config = ServiceLauncher::load_and_validate_config(&config_path).await?;
        ServiceLauncher::serve(config_path, config, *self_trigger).await
    }
}

/// 协议检测调度命令
pub struct CheckMonitorsCommand;

#[async_trait]
impl Command for CheckMonitorsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::CheckMonitors { format } = &args.command else {
            return Ok(());
        };

        let config = load_config(args).await?;
        let components = ServiceLauncher::build_components(&config).await?;
        let summary = components
            .scheduler
            .run_monitor_pass(chrono::Utc::now())
            .await
            .context("检测调度失败")?;

        print_pass_summary(&summary, *format)
    }
}

/// 域名检测调度命令
pub struct CheckDomainsCommand;

#[async_trait]
impl Command for CheckDomainsCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::CheckDomains { format } = &args.command else {
            return Ok(());
        };

        let config = load_config(args).await?;
        let components = ServiceLauncher::build_components(&config).await?;
        let summary = components
            .scheduler
            .run_domain_pass(chrono::Utc::now())
            .await
            .context("域名检测调度失败")?;

        print_pass_summary(&summary, *format)
    }
}

/// 单次探测命令
pub struct ProbeCommand;

#[async_trait]
impl Command for ProbeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Probe { url, format } = &args.command else {
            return Ok(());
        };

        let global = load_global_or_default(args).await?;
        let probes = ProbeSet::new(&global.probe_settings()).context("创建探测器失败")?;
        let outcome = probes.probe_url(url).await;

        print_probe_outcome(url, &outcome, *format)
    }
}

/// 单个域名检测命令
pub struct DomainCommand;

#[async_trait]
impl Command for DomainCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Domain { domain, format } = &args.command else {
            return Ok(());
        };

        let global = load_global_or_default(args).await?;
        let checker =
            DomainChecker::system(global.domain_settings()).context("创建域名检测器失败")?;
        let result = checker.check_domain(domain).await;

        print_domain_result(&result, *format)
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Validate { verbose } = &args.command else {
            return Ok(());
        };

        let config_path = args.get_config_path();
        println!("验证配置文件: {}", config_path.display());

        let config = TomlConfigLoader::new(true)
            .load_from_file(&config_path)
            .await
            .context("配置文件验证失败")?;

        println!("✓ 配置文件验证通过");
        println!(
            "✓ 找到 {} 个监控项, {} 个用户",
            config.monitors.len(),
            config.users.len()
        );

        if *verbose {
            let global = &config.global;
            println!("全局配置:");
            println!("  日志级别: {}", global.log_level);
            println!("  最大并发: {}", global.max_concurrent_checks);
            println!("  告警策略: {}", global.alert_policy);
            println!("  短信服务: {}", if global.sms.is_some() { "已配置" } else { "未配置" });
            println!("  域名检测间隔: {}小时", global.domain_check_interval_hours);

            println!("监控项:");
            for (i, monitor) in config.monitors.iter().enumerate() {
                println!(
                    "  {}. {} ({}) 每{}分钟 {}",
                    i + 1,
                    monitor.name,
                    monitor.url,
                    monitor.interval_minutes,
                    if monitor.active { "启用" } else { "停用" }
                );
            }
        }

        Ok(())
    }
}

/// 测试告警命令
pub struct TestAlertCommand;

#[async_trait]
impl Command for TestAlertCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::TestAlert { user } = &args.command else {
            return Ok(());
        };

        let config = load_config(args).await?;
        let Some(account) = config.users.iter().find(|u| u.id == *user) else {
            bail!("用户不存在: {}", user);
        };
        let preference = &account.alerts;
        if preference.sms_target().is_none() && preference.chat_target().is_none() {
            bail!("用户 {} 没有启用任何告警通道", user);
        }

        let dispatcher = AlertDispatcher::new(config.global.dispatcher_config()?)
            .context("创建告警分发器失败")?;

        let monitor = Monitor::new("test-alert", user.clone(), "Test Alert", "https://example.com", 5);
        let check = CheckResult::from_outcome(
            &monitor.id,
            ProbeOutcome::down(Duration::ZERO, "This is a test alert").with_status_code(503),
            chrono::Utc::now(),
        );

        let outcomes = dispatcher
            .dispatch(&AlertPayload::new(&monitor, &check), preference)
            .await;

        let mut failed = 0;
        for outcome in &outcomes {
            match &outcome.error {
                None => println!("✓ {} 发送成功", outcome.channel),
                Some(e) => {
                    failed += 1;
                    println!("✗ {} 发送失败: {}", outcome.channel, e);
                }
            }
        }

        if failed > 0 {
            bail!("{} 个通道发送失败", failed);
        }
        Ok(())
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Init { config_path, force } = &args.command else {
            return Ok(());
        };
        self.create_config_file(config_path, *force).await
    }
}

impl InitCommand {
    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("创建目录失败: {}", parent.display()))?;
        }

        tokio::fs::write(config_path, CONFIG_TEMPLATE)
            .await
            .with_context(|| format!("写入配置文件失败: {}", config_path.display()))?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的监控项和告警通道");
        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}

fn print_pass_summary(summary: &PassSummary, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            println!("调度时间: {}", summary.timestamp.to_rfc3339());
            println!("评估监控项: {}", summary.monitors_checked);
            println!("到期监控项: {}", summary.monitors_due);
            println!("写入记录: {}", summary.recorded);
            println!("写入失败: {}", summary.record_failures);
            println!("发送告警: {}", summary.alerts_sent);
        }
    }
    Ok(())
}

fn print_probe_outcome(url: &str, outcome: &ProbeOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "url": url,
                "status": outcome.status,
                "response_time": outcome.response_time_ms(),
                "status_code": outcome.status_code,
                "error_message": outcome.error_message,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            let code = outcome
                .status_code
                .map(|c| format!(" HTTP {c}"))
                .unwrap_or_default();
            println!(
                "{} {}{} {}ms",
                url,
                outcome.status,
                code,
                outcome.response_time_ms()
            );
            if let Some(error) = &outcome.error_message {
                println!("  {error}");
            }
        }
    }
    Ok(())
}

fn print_domain_result(result: &DomainCheckResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(result)?),
        OutputFormat::Text => {
            println!("域名: {}", result.domain);

            let ssl = &result.ssl;
            let now = chrono::Utc::now();
            if ssl.valid && result.ssl_expires_within(now, SSL_EXPIRY_WARNING_DAYS) {
                println!("  警告: 证书将在{SSL_EXPIRY_WARNING_DAYS}天内到期");
            }
            match &ssl.error {
                None => println!(
                    "  SSL: 有效, 到期 {}, 签发者 {}",
                    ssl.expires_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "未知".to_string()),
                    ssl.issuer.as_deref().unwrap_or("未知")
                ),
                Some(e) if ssl.valid => println!("  SSL: 有效 ({e})"),
                Some(e) => println!("  SSL: 无效 ({e})"),
            }

            let dns = &result.dns;
            if dns.resolved {
                println!("  DNS: {}", dns.records.join(", "));
            } else {
                println!("  DNS: 解析失败 ({})", dns.error.as_deref().unwrap_or(""));
            }

            let whois = &result.whois;
            println!(
                "  WHOIS: 注册商 {}, 到期 {}",
                whois.registrar.as_deref().unwrap_or("未知"),
                whois
                    .expires_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "未知".to_string())
            );
            if let Some(e) = &whois.error {
                println!("  WHOIS错误: {e}");
            }
        }
    }
    Ok(())
}
