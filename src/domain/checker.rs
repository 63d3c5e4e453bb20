//! 域名检测器
//!
//! 并发执行TLS、DNS、WHOIS三项子检测并聚合为一条记录

use crate::domain::dns::{DnsResolver, SystemResolver};
use crate::domain::result::DomainCheckResult;
use crate::domain::tls::{RustlsInspector, TlsInspector};
use crate::domain::whois::{CommandWhois, WhoisLookup};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 域名检测参数
#[derive(Debug, Clone)]
pub struct DomainSettings {
    /// TLS连接加握手超时
    pub tls_timeout: Duration,
    /// DNS解析超时
    pub dns_timeout: Duration,
    /// WHOIS命令超时
    pub whois_timeout: Duration,
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            tls_timeout: Duration::from_secs(10),
            dns_timeout: Duration::from_secs(10),
            whois_timeout: Duration::from_secs(15),
        }
    }
}

impl DomainSettings {
    /// 三项子检测中最长的超时
    pub fn max_timeout(&self) -> Duration {
        self.tls_timeout.max(self.dns_timeout).max(self.whois_timeout)
    }
}

/// 把监控URL规范化为域名
///
/// 去掉协议前缀、用户信息、路径和端口，并转为小写
pub fn normalize_domain(input: &str) -> String {
    let mut rest = input.trim();

    if let Some(idx) = rest.find("://") {
        rest = &rest[idx + 3..];
    }
    if let Some(idx) = rest.find(['/', '?', '#']) {
        rest = &rest[..idx];
    }
    if let Some(idx) = rest.rfind('@') {
        rest = &rest[idx + 1..];
    }

    let host = if rest.starts_with('[') {
        // IPv6字面量
        rest.split(']')
            .next()
            .unwrap_or(rest)
            .trim_start_matches('[')
    } else {
        match rest.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
            _ => rest,
        }
    };

    host.trim_end_matches('.').to_ascii_lowercase()
}

/// 域名检测器
#[derive(Clone)]
pub struct DomainChecker {
    tls: Arc<dyn TlsInspector>,
    dns: Arc<dyn DnsResolver>,
    whois: Arc<dyn WhoisLookup>,
    settings: DomainSettings,
}

impl DomainChecker {
    /// 使用指定的子检测实现创建检测器
    pub fn new(
        tls: Arc<dyn TlsInspector>,
        dns: Arc<dyn DnsResolver>,
        whois: Arc<dyn WhoisLookup>,
        settings: DomainSettings,
    ) -> Self {
        Self {
            tls,
            dns,
            whois,
            settings,
        }
    }

    /// 使用系统实现（rustls、系统解析器、whois命令）创建检测器
    ///
    /// # 参数
    /// * `settings` - 超时设置
    ///
    /// # 返回
    /// * `Result<Self, rustls::Error>` - TLS配置失败时返回错误
    pub fn system(settings: DomainSettings) -> Result<Self, rustls::Error> {
        Ok(Self::new(
            Arc::new(RustlsInspector::new(settings.tls_timeout)?),
            Arc::new(SystemResolver::new(settings.dns_timeout)),
            Arc::new(CommandWhois::new(settings.whois_timeout)),
            settings,
        ))
    }

    /// 检测参数
    pub fn settings(&self) -> &DomainSettings {
        &self.settings
    }

    /// 检测一个域名
    ///
    /// 三项子检测互不影响，失败的子检测只在各自字段中记录错误
    pub async fn check_domain(&self, input: &str) -> DomainCheckResult {
        let domain = normalize_domain(input);
        if domain.is_empty() {
            return DomainCheckResult::failed(domain, "Empty domain");
        }
        if domain.starts_with('-') {
            return DomainCheckResult::failed(domain, "Invalid domain");
        }

        let (ssl, dns, whois) = tokio::join!(
            self.tls.inspect(&domain),
            self.dns.resolve(&domain),
            self.whois.lookup(&domain),
        );

        debug!(
            "域名检测完成: {} ssl={} dns={} whois={}",
            domain,
            ssl.valid,
            dns.resolved,
            whois.error.is_none()
        );

        DomainCheckResult {
            domain,
            ssl,
            dns,
            whois,
        }
    }
}
