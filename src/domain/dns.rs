//! DNS解析检测

use crate::domain::result::DnsCheck;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::lookup_host;
use tokio::time::timeout;

/// DNS解析接口
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// 解析域名的A记录
    async fn resolve(&self, domain: &str) -> DnsCheck;
}

/// 使用系统解析器的实现
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    /// 创建新的解析器
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DnsResolver for SystemResolver {
    async fn resolve(&self, domain: &str) -> DnsCheck {
        match timeout(self.timeout, lookup_host((domain, 0))).await {
            Ok(Ok(addrs)) => ipv4_records(addrs),
            Ok(Err(e)) => DnsCheck::failed(e.to_string()),
            Err(_) => DnsCheck::failed(format!(
                "DNS timeout after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}

/// 只保留IPv4地址，去重并排序
fn ipv4_records(addrs: impl Iterator<Item = SocketAddr>) -> DnsCheck {
    let records: BTreeSet<_> = addrs
        .filter_map(|addr| match addr.ip() {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();

    if records.is_empty() {
        return DnsCheck::failed("No A records found");
    }

    DnsCheck {
        resolved: true,
        records: records.into_iter().map(|ip| ip.to_string()).collect(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_records_are_sorted_and_deduplicated() {
        let addrs: Vec<SocketAddr> = vec![
            "10.0.0.2:0".parse().unwrap(),
            "[::1]:0".parse().unwrap(),
            "10.0.0.1:0".parse().unwrap(),
            "10.0.0.2:0".parse().unwrap(),
        ];

        let check = ipv4_records(addrs.into_iter());
        assert!(check.resolved);
        assert_eq!(check.records, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn test_ipv6_only_is_unresolved() {
        let addrs: Vec<SocketAddr> = vec!["[::1]:0".parse().unwrap()];
        let check = ipv4_records(addrs.into_iter());
        assert!(!check.resolved);
        assert_eq!(check.error.as_deref(), Some("No A records found"));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let check = SystemResolver::new(Duration::from_secs(2))
            .resolve("127.0.0.1")
            .await;
        assert!(check.resolved);
        assert_eq!(check.records, vec!["127.0.0.1"]);
    }

    #[tokio::test]
    async fn test_invalid_name_is_unresolved() {
        let check = SystemResolver::new(Duration::from_secs(5))
            .resolve("nonexistent.invalid")
            .await;
        assert!(!check.resolved);
        assert!(check.error.is_some());
    }
}
