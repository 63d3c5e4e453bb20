//! WHOIS注册信息查询
//!
//! 查询和解析都放在 `WhoisLookup` 之后，输出格式的差异不会泄漏到检测流程中

use crate::domain::result::WhoisCheck;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// WHOIS查询接口
#[async_trait]
pub trait WhoisLookup: Send + Sync {
    /// 查询域名注册信息
    async fn lookup(&self, domain: &str) -> WhoisCheck;
}

/// 调用系统 `whois` 命令的实现
#[derive(Debug, Clone)]
pub struct CommandWhois {
    program: String,
    timeout: Duration,
}

impl CommandWhois {
    /// 创建新的WHOIS查询器
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "whois".to_string(),
            timeout,
        }
    }

    /// 指定whois程序
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl WhoisLookup for CommandWhois {
    async fn lookup(&self, domain: &str) -> WhoisCheck {
        if domain.starts_with('-') {
            return WhoisCheck::failed(format!("Invalid domain: {domain}"));
        }

        let child = Command::new(&self.program)
            .arg(domain)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return WhoisCheck::failed(format!("Failed to run whois: {e}")),
        };

        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return WhoisCheck::failed(format!("Whois lookup failed: {e}")),
            Err(_) => {
                return WhoisCheck::failed(format!(
                    "Whois timeout after {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        // 部分whois客户端即使查到记录也以非零退出
        if !output.status.success() && stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return WhoisCheck::failed(format!("Whois lookup failed: {}", stderr.trim()));
        }

        debug!("WHOIS输出 {} 字节: {}", stdout.len(), domain);
        parse_whois_output(&stdout)
    }
}

struct WhoisPatterns {
    registrar: Regex,
    expiry: Vec<Regex>,
}

static PATTERNS: OnceLock<Option<WhoisPatterns>> = OnceLock::new();

fn patterns() -> Option<&'static WhoisPatterns> {
    PATTERNS
        .get_or_init(|| {
            let registrar = Regex::new(r"(?im)^\s*Registrar:[ \t]*(\S.*?)\s*$").ok()?;
            let expiry = [
                r"(?im)^\s*Registry Expiry Date:[ \t]*(\S.*?)\s*$",
                r"(?im)^\s*Registrar Registration Expiration Date:[ \t]*(\S.*?)\s*$",
                r"(?im)^\s*Expiration Date:[ \t]*(\S.*?)\s*$",
                r"(?im)^\s*Expiry Date:[ \t]*(\S.*?)\s*$",
                r"(?im)^\s*paid-till:[ \t]*(\S.*?)\s*$",
            ]
            .iter()
            .map(|p| Regex::new(p).ok())
            .collect::<Option<Vec<_>>>()?;
            Some(WhoisPatterns { registrar, expiry })
        })
        .as_ref()
}

/// 从WHOIS文本中提取注册商和过期时间
///
/// 找不到或无法解析的字段保持为空
pub fn parse_whois_output(output: &str) -> WhoisCheck {
    let Some(patterns) = patterns() else {
        return WhoisCheck::default();
    };

    let registrar = patterns
        .registrar
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let expires_at = patterns
        .expiry
        .iter()
        .filter_map(|re| re.captures(output))
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_whois_date(m.as_str()));

    WhoisCheck {
        registrar,
        expires_at,
        error: None,
    }
}

/// 解析WHOIS中常见的日期格式
pub fn parse_whois_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S UTC",
        "%Y.%m.%d %H:%M:%S",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y.%m.%d", "%Y/%m/%d", "%d-%b-%Y", "%d.%m.%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VERISIGN_OUTPUT: &str = "   Domain Name: EXAMPLE.COM\n\
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\n\
   Registrar WHOIS Server: whois.iana.org\n\
   Updated Date: 2024-08-14T07:01:34Z\n\
   Creation Date: 1995-08-14T04:00:00Z\n\
   Registry Expiry Date: 2025-08-13T04:00:00Z\n\
   Registrar: RESERVED-Internet Assigned Numbers Authority\n\
   Registrar IANA ID: 376\n";

    #[test]
    fn test_parse_verisign_style_output() {
        let check = parse_whois_output(VERISIGN_OUTPUT);
        assert_eq!(
            check.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(
            check.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 13, 4, 0, 0).unwrap())
        );
        assert!(check.error.is_none());
    }

    #[test]
    fn test_parse_alternative_expiry_labels() {
        let output = "Registrar: Example Registrar, Inc.\n\
Registrar Registration Expiration Date: 2027-03-01T00:00:00.000Z\n";
        let check = parse_whois_output(output);
        assert_eq!(
            check.expires_at,
            Some(Utc.with_ymd_and_hms(2027, 3, 1, 0, 0, 0).unwrap())
        );

        let output = "domain: EXAMPLE.RU\npaid-till: 2026-11-30T21:00:00Z\n";
        let check = parse_whois_output(output);
        assert!(check.registrar.is_none());
        assert_eq!(
            check.expires_at,
            Some(Utc.with_ymd_and_hms(2026, 11, 30, 21, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let check = parse_whois_output("No match for domain \"NOPE.EXAMPLE\".\n");
        assert!(check.registrar.is_none());
        assert!(check.expires_at.is_none());
        assert!(check.error.is_none());
    }

    #[test]
    fn test_unparseable_date_is_absent() {
        let check = parse_whois_output("Registrar: X\nExpiry Date: sometime next year\n");
        assert_eq!(check.registrar.as_deref(), Some("X"));
        assert!(check.expires_at.is_none());
    }

    #[test]
    fn test_parse_whois_date_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 5, 17, 0, 0, 0).unwrap();
        assert_eq!(parse_whois_date("2026-05-17"), Some(expected));
        assert_eq!(parse_whois_date("17-May-2026"), Some(expected));
        assert_eq!(parse_whois_date("2026.05.17"), Some(expected));
        assert_eq!(parse_whois_date("2026-05-17 00:00:00"), Some(expected));
        assert_eq!(parse_whois_date("garbage"), None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_error() {
        let check = CommandWhois::new(Duration::from_secs(1))
            .with_program("/nonexistent/uptyne-whois")
            .lookup("example.com")
            .await;
        assert!(check.error.unwrap().starts_with("Failed to run whois"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_option_like_domain_is_not_passed_to_command() {
        let check = CommandWhois::new(Duration::from_secs(1))
            .with_program("echo")
            .lookup("-n")
            .await;
        assert_eq!(check.error.as_deref(), Some("Invalid domain: -n"));
        assert!(check.registrar.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_output_is_parsed() {
        // `echo` 把参数原样输出，当作一段WHOIS文本
        let check = CommandWhois::new(Duration::from_secs(1))
            .with_program("echo")
            .lookup("Registrar: Echo Registrar")
            .await;
        assert_eq!(check.registrar.as_deref(), Some("Echo Registrar"));
        assert!(check.error.is_none());
    }
}
