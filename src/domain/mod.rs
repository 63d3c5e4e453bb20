//! 域名与证书检测模块
//!
//! 提供TLS证书、DNS解析和WHOIS注册信息检测

pub mod checker;
pub mod dns;
pub mod result;
pub mod tls;
pub mod whois;

// 重新导出主要类型
pub use checker::{normalize_domain, DomainChecker, DomainSettings};
pub use dns::{DnsResolver, SystemResolver};
pub use result::{DnsCheck, DomainCheck, DomainCheckResult, SslCheck, WhoisCheck};
pub use tls::{RustlsInspector, TlsInspector};
pub use whois::{parse_whois_output, CommandWhois, WhoisLookup};
