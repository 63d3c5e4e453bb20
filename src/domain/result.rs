//! 域名检测结果
//!
//! 三项子检测各自携带成功标记和错误信息，任一失败都不影响整体结果

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// TLS证书检测结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslCheck {
    /// 握手是否成功且证书可信
    pub valid: bool,
    /// 证书过期时间
    pub expires_at: Option<DateTime<Utc>>,
    /// 签发机构（issuer O）
    pub issuer: Option<String>,
    /// 错误信息
    pub error: Option<String>,
}

impl SslCheck {
    /// 失败结果
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// DNS解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsCheck {
    /// 是否解析成功
    pub resolved: bool,
    /// A记录
    pub records: Vec<String>,
    /// 错误信息
    pub error: Option<String>,
}

impl DnsCheck {
    /// 失败结果
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            resolved: false,
            records: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// WHOIS注册信息
///
/// 字段缺失表示输出中没有找到，不是错误
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhoisCheck {
    /// 注册商
    pub registrar: Option<String>,
    /// 注册过期时间
    pub expires_at: Option<DateTime<Utc>>,
    /// 查询本身失败时的错误信息
    pub error: Option<String>,
}

impl WhoisCheck {
    /// 失败结果
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// 一次域名检测的聚合结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCheckResult {
    /// 规范化后的域名
    pub domain: String,
    /// TLS证书
    pub ssl: SslCheck,
    /// DNS解析
    pub dns: DnsCheck,
    /// WHOIS
    pub whois: WhoisCheck,
}

impl DomainCheckResult {
    /// 三项子检测都以同一错误失败的结果
    pub fn failed(domain: impl Into<String>, error: &str) -> Self {
        Self {
            domain: domain.into(),
            ssl: SslCheck::failed(error),
            dns: DnsCheck::failed(error),
            whois: WhoisCheck::failed(error),
        }
    }

    /// 证书是否会在指定天数内过期
    pub fn ssl_expires_within(&self, now: DateTime<Utc>, days: i64) -> bool {
        self.ssl
            .expires_at
            .map(|expires| expires - now <= chrono::Duration::days(days))
            .unwrap_or(false)
    }
}

/// 域名检测记录，写入后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCheck {
    /// 记录ID
    pub id: Uuid,
    /// 所属监控项
    pub monitor_id: String,
    /// 检测结果
    #[serde(flatten)]
    pub result: DomainCheckResult,
    /// 检测时间
    pub checked_at: DateTime<Utc>,
}

impl DomainCheck {
    /// 由检测结果生成记录
    pub fn new(
        monitor_id: impl Into<String>,
        result: DomainCheckResult,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            monitor_id: monitor_id.into(),
            result,
            checked_at,
        }
    }
}
