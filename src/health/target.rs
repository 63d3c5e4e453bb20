//! 检测目标解析
//!
//! 根据URL协议把监控地址解析为具体的探测目标，解析只发生一次

use crate::error::TargetError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// TCP目标未指定端口时使用的默认端口
pub const DEFAULT_TCP_PORT: u16 = 80;

/// 探测协议类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    /// HTTP/HTTPS
    Http,
    /// TCP连接
    Tcp,
    /// ICMP ping
    Ping,
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Http => write!(f, "http"),
            ProbeKind::Tcp => write!(f, "tcp"),
            ProbeKind::Ping => write!(f, "ping"),
        }
    }
}

/// 已解析的探测目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `http://` 或 `https://`
    Http {
        /// 完整URL
        url: String,
        /// 主机名
        host: String,
    },
    /// `tcp://host:port`
    Tcp { host: String, port: u16 },
    /// `ping://host`
    Ping { host: String },
}

impl Target {
    /// 解析监控URL
    ///
    /// # 参数
    /// * `raw` - 监控配置中的URL
    ///
    /// # 返回
    /// * `Result<Target, TargetError>` - 解析结果
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        let url = Url::parse(trimmed).map_err(|e| TargetError::Malformed(format!("{trimmed}: {e}")))?;

        let host = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::MissingHost(trimmed.to_string()))?;

        // 主机名会作为外部命令的参数，不能被当成选项
        if host.starts_with('-') {
            return Err(TargetError::InvalidHost(host));
        }

        match url.scheme() {
            "http" | "https" => Ok(Target::Http {
                url: url.to_string(),
                host,
            }),
            "tcp" => {
                let port = url.port().unwrap_or(DEFAULT_TCP_PORT);
                if port == 0 {
                    return Err(TargetError::InvalidPort(trimmed.to_string()));
                }
                Ok(Target::Tcp { host, port })
            }
            "ping" => Ok(Target::Ping { host }),
            other => Err(TargetError::UnsupportedScheme(other.to_string())),
        }
    }

    /// 探测协议类型
    pub fn kind(&self) -> ProbeKind {
        match self {
            Target::Http { .. } => ProbeKind::Http,
            Target::Tcp { .. } => ProbeKind::Tcp,
            Target::Ping { .. } => ProbeKind::Ping,
        }
    }

    /// 目标主机名
    pub fn host(&self) -> &str {
        match self {
            Target::Http { host, .. } | Target::Tcp { host, .. } | Target::Ping { host } => host,
        }
    }

    /// 是否为HTTP(S)目标，域名检测只对这类目标执行
    pub fn is_http(&self) -> bool {
        matches!(self, Target::Http { .. })
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Target::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Http { url, .. } => write!(f, "{url}"),
            Target::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            Target::Ping { host } => write!(f, "ping://{host}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_targets() {
        let target = Target::parse("https://example.com/health").unwrap();
        assert_eq!(target.kind(), ProbeKind::Http);
        assert_eq!(target.host(), "example.com");
        assert!(target.is_http());

        let target = Target::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(target.host(), "127.0.0.1");
    }

    #[test]
    fn test_parse_tcp_target() {
        let target = Target::parse("tcp://10.0.0.1:9999").unwrap();
        assert_eq!(
            target,
            Target::Tcp {
                host: "10.0.0.1".to_string(),
                port: 9999
            }
        );
        assert!(!target.is_http());
    }

    #[test]
    fn test_tcp_target_defaults_port() {
        let target = Target::parse("tcp://db.internal").unwrap();
        assert_eq!(
            target,
            Target::Tcp {
                host: "db.internal".to_string(),
                port: DEFAULT_TCP_PORT
            }
        );
    }

    #[test]
    fn test_parse_ping_target() {
        let target = Target::parse("ping://8.8.8.8").unwrap();
        assert_eq!(
            target,
            Target::Ping {
                host: "8.8.8.8".to_string()
            }
        );
        assert_eq!(target.to_string(), "ping://8.8.8.8");
    }

    #[test]
    fn test_parse_ipv6_tcp_target() {
        let target = Target::parse("tcp://[::1]:6379").unwrap();
        assert_eq!(target.host(), "::1");
    }

    #[test]
    fn test_rejects_unsupported_scheme() {
        let err = Target::parse("ftp://example.com").unwrap_err();
        assert_eq!(err, TargetError::UnsupportedScheme("ftp".to_string()));
    }

    #[test]
    fn test_rejects_host_that_looks_like_an_option() {
        assert_eq!(
            Target::parse("ping://-f").unwrap_err(),
            TargetError::InvalidHost("-f".to_string())
        );
        assert!(matches!(
            Target::parse("tcp://-oProxyCommand:22"),
            Err(TargetError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_url() {
        assert!(matches!(
            Target::parse("not a url"),
            Err(TargetError::Malformed(_))
        ));
        assert!(matches!(
            Target::parse("tcp://host:notaport"),
            Err(TargetError::Malformed(_))
        ));
    }
}
