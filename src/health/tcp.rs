//! TCP探测器实现

use crate::health::result::ProbeOutcome;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tracing::debug;

/// TCP连接探测器
///
/// 只验证三次握手能否完成，连接建立后立即关闭
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    /// 创建新的TCP探测器
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// 超时时间
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 尝试建立一次TCP连接
    ///
    /// 超时和连接错误都视为不可用，地址解析包含在超时之内
    pub async fn check(&self, host: &str, port: u16) -> ProbeOutcome {
        self.check_with(host, port, TcpStream::connect((host, port))).await
    }

    /// 用给定的连接过程完成一次检测
    ///
    /// # 参数
    /// * `host` / `port` - 目标，仅用于日志
    /// * `connect` - 建立连接的future
    pub async fn check_with<F, S>(&self, host: &str, port: u16, connect: F) -> ProbeOutcome
    where
        F: Future<Output = io::Result<S>>,
    {
        let start_time = Instant::now();
        let connect_result = timeout(self.timeout, connect).await;
        let response_time = start_time.elapsed();

        match connect_result {
            Ok(Ok(stream)) => {
                debug!("TCP连接成功: {}:{} ({:?})", host, port, response_time);
                drop(stream);
                ProbeOutcome::up(response_time)
            }
            Ok(Err(e)) => ProbeOutcome::down(response_time, format!("TCP error: {e}")),
            Err(_) => ProbeOutcome::down(
                response_time,
                format!("TCP timeout after {}ms", self.timeout.as_millis()),
            ),
        }
    }
}
