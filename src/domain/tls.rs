//! TLS证书检测
//!
//! 在443端口以域名作为SNI完成握手，读取叶子证书的过期时间和签发机构

use crate::domain::result::SslCheck;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// HTTPS默认端口
pub const TLS_PORT: u16 = 443;

/// TLS证书检测接口
#[async_trait]
pub trait TlsInspector: Send + Sync {
    /// 检测域名的证书，失败时返回 `valid=false` 并携带错误信息
    async fn inspect(&self, domain: &str) -> SslCheck;
}

/// 基于rustls和系统信任库的证书检测器
#[derive(Clone)]
pub struct RustlsInspector {
    connector: TlsConnector,
    timeout: Duration,
    port: u16,
}

impl std::fmt::Debug for RustlsInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustlsInspector")
            .field("timeout", &self.timeout)
            .field("port", &self.port)
            .finish()
    }
}

impl RustlsInspector {
    /// 使用系统信任库创建检测器
    ///
    /// # 参数
    /// * `timeout` - 连接加握手的总超时
    ///
    /// # 返回
    /// * `Result<Self, rustls::Error>` - 协议版本配置失败时返回错误
    pub fn new(timeout: Duration) -> Result<Self, rustls::Error> {
        let native = rustls_native_certs::load_native_certs();
        if !native.errors.is_empty() {
            warn!("加载系统根证书时出现 {} 个错误", native.errors.len());
        }

        let mut roots = RootCertStore::empty();
        let (added, ignored) = roots.add_parsable_certificates(native.certs);
        debug!("加载系统根证书: {} 个可用, {} 个忽略", added, ignored);

        Self::with_roots(roots, timeout)
    }

    /// 使用指定的信任库创建检测器
    pub fn with_roots(roots: RootCertStore, timeout: Duration) -> Result<Self, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            timeout,
            port: TLS_PORT,
        })
    }

    /// 指定端口
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    async fn handshake(&self, domain: &str) -> std::io::Result<Option<Vec<u8>>> {
        let server_name = ServerName::try_from(domain.to_string())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        let tcp = TcpStream::connect((domain, self.port)).await?;
        let stream = self.connector.connect(server_name, tcp).await?;

        let (_, connection) = stream.get_ref();
        Ok(connection
            .peer_certificates()
            .and_then(|certs| certs.first())
            .map(|leaf| leaf.as_ref().to_vec()))
    }
}

#[async_trait]
impl TlsInspector for RustlsInspector {
    async fn inspect(&self, domain: &str) -> SslCheck {
        match timeout(self.timeout, self.handshake(domain)).await {
            Ok(Ok(Some(der))) => parse_leaf_certificate(&der),
            Ok(Ok(None)) => SslCheck::failed("No peer certificate presented"),
            Ok(Err(e)) => {
                debug!("TLS握手失败: {}: {}", domain, e);
                SslCheck::failed(e.to_string())
            }
            Err(_) => SslCheck::failed(format!(
                "TLS timeout after {}ms",
                self.timeout.as_millis()
            )),
        }
    }
}

/// 从DER编码的叶子证书中提取过期时间和签发机构
///
/// 握手已经通过校验，解析失败只会缺少字段
pub fn parse_leaf_certificate(der: &[u8]) -> SslCheck {
    match x509_parser::parse_x509_certificate(der) {
        Ok((_, cert)) => {
            let expires_at: Option<DateTime<Utc>> =
                DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0);
            let issuer = cert
                .issuer()
                .iter_organization()
                .next()
                .and_then(|attr| attr.as_str().ok())
                .map(str::to_string);

            SslCheck {
                valid: true,
                expires_at,
                issuer,
                error: None,
            }
        }
        Err(e) => SslCheck {
            valid: true,
            error: Some(format!("Failed to parse certificate: {e}")),
            ..Default::default()
        },
    }
}
