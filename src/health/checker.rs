//! 协议探测器
//!
//! 定义探测接口，并按目标协议把请求分发到HTTP、TCP或Ping探测器

use crate::health::http::HttpProbe;
use crate::health::ping::PingProbe;
use crate::health::result::ProbeOutcome;
use crate::health::target::{ProbeKind, Target};
use crate::health::tcp::TcpProbe;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// 默认User-Agent
pub const DEFAULT_USER_AGENT: &str = "UptimeMonitor/1.0";

/// 协议探测trait，定义检测接口
///
/// 探测本身从不返回错误：所有失败都折叠为 `Down` 或 `Error` 状态
#[async_trait]
pub trait ProtocolProbe: Send + Sync {
    /// 对已解析的目标执行一次探测
    async fn probe(&self, target: &Target) -> ProbeOutcome;

    /// 该协议单次探测的最长耗时
    fn timeout_for(&self, kind: ProbeKind) -> Duration;

    /// 解析URL后探测
    ///
    /// URL非法时立即返回出错结果，响应时间为0
    async fn probe_url(&self, raw: &str) -> ProbeOutcome {
        match Target::parse(raw) {
            Ok(target) => self.probe(&target).await,
            Err(e) => ProbeOutcome::error(Duration::ZERO, e.to_string()),
        }
    }
}

/// 探测器参数
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// HTTP总超时
    pub http_timeout: Duration,
    /// TCP连接超时
    pub tcp_timeout: Duration,
    /// Ping超时
    pub ping_timeout: Duration,
    /// HTTP请求的User-Agent
    pub user_agent: String,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(30),
            tcp_timeout: Duration::from_millis(5000),
            ping_timeout: Duration::from_millis(5000),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// 三种协议探测器的组合
#[derive(Debug, Clone)]
pub struct ProbeSet {
    http: HttpProbe,
    tcp: TcpProbe,
    ping: PingProbe,
}

impl ProbeSet {
    /// 创建探测器组合
    ///
    /// # 参数
    /// * `settings` - 探测器参数
    ///
    /// # 返回
    /// * `Result<Self, reqwest::Error>` - HTTP客户端构建失败时返回错误
    pub fn new(settings: &ProbeSettings) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: HttpProbe::new(settings.http_timeout, &settings.user_agent)?,
            tcp: TcpProbe::new(settings.tcp_timeout),
            ping: PingProbe::new(settings.ping_timeout),
        })
    }
}

#[async_trait]
impl ProtocolProbe for ProbeSet {
    async fn probe(&self, target: &Target) -> ProbeOutcome {
        debug!("开始探测: {}", target);
        match target {
            Target::Http { url, .. } => self.http.check(url).await,
            Target::Tcp { host, port } => self.tcp.check(host, *port).await,
            Target::Ping { host } => self.ping.check(host).await,
        }
    }

    fn timeout_for(&self, kind: ProbeKind) -> Duration {
        match kind {
            ProbeKind::Http => self.http.timeout(),
            ProbeKind::Tcp => self.tcp.timeout(),
            ProbeKind::Ping => self.ping.timeout(),
        }
    }
}
