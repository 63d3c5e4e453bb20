//! HTTP探测器实现
//!
//! 发送GET请求并按状态码分类，不做期望状态码校验

use crate::health::result::{CheckStatus, ProbeOutcome};
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

/// HTTP探测器
#[derive(Debug, Clone)]
pub struct HttpProbe {
    /// HTTP客户端
    client: Client,
    /// 总超时时间
    timeout: Duration,
}

impl HttpProbe {
    /// 创建新的HTTP探测器
    ///
    /// # 参数
    /// * `timeout` - 总超时时间
    /// * `user_agent` - 固定的User-Agent
    ///
    /// # 返回
    /// * `Result<Self, reqwest::Error>` - 探测器实例
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client, timeout })
    }

    /// 超时时间
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行一次GET请求
    ///
    /// 响应时间从发起请求计算到收到响应头为止
    pub async fn check(&self, url: &str) -> ProbeOutcome {
        let start_time = Instant::now();

        let response_result = timeout(self.timeout, self.client.get(url).send()).await;
        let response_time = start_time.elapsed();

        match response_result {
            Ok(Ok(response)) => {
                let status_code = response.status().as_u16();
                debug!("HTTP探测完成: {} -> {}", url, status_code);
                Self::classify_response(status_code, response_time)
            }
            Ok(Err(e)) => ProbeOutcome::error(response_time, format_request_error(&e)),
            Err(_) => ProbeOutcome::error(response_time, "Request timeout"),
        }
    }

    /// 根据状态码生成探测结果
    fn classify_response(status_code: u16, response_time: Duration) -> ProbeOutcome {
        let status = classify_status_code(status_code);
        let outcome = ProbeOutcome::new(status, response_time).with_status_code(status_code);

        if status.is_healthy() {
            outcome
        } else {
            outcome.with_error(format!(
                "HTTP {} {}",
                status_code,
                reqwest::StatusCode::from_u16(status_code)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown")
            ))
        }
    }
}

/// 状态码分类：200-399为正常，其余为不可用
pub fn classify_status_code(status_code: u16) -> CheckStatus {
    if (200..400).contains(&status_code) {
        CheckStatus::Up
    } else {
        CheckStatus::Down
    }
}

/// 格式化请求错误信息，使其更加清晰易读
fn format_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        let detail = error_chain(error);
        if detail.contains("dns") || detail.contains("resolve") {
            format!("DNS resolution failed: {detail}")
        } else if detail.contains("certificate") || detail.contains("tls") {
            format!("SSL/TLS error: {detail}")
        } else {
            format!("Connection failed: {detail}")
        }
    } else if error.is_request() {
        format!("Invalid request: {}", error_chain(error))
    } else if error.is_redirect() {
        "Too many redirects".to_string()
    } else {
        format!("Request failed: {}", error_chain(error))
    }
}

/// 拼接错误链，底层原因（DNS、TLS）通常在source里
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(timeout: Duration) -> HttpProbe {
        HttpProbe::new(timeout, "UptimeMonitor/1.0").unwrap()
    }

    #[test]
    fn test_classify_status_code_ranges() {
        for code in [200, 204, 301, 302, 399] {
            assert_eq!(classify_status_code(code), CheckStatus::Up, "{code}");
        }
        for code in [400, 401, 404, 418, 500, 503, 599] {
            assert_eq!(classify_status_code(code), CheckStatus::Down, "{code}");
        }
    }

    #[tokio::test]
    async fn test_ok_response_is_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .match_header("user-agent", "UptimeMonitor/1.0")
            .with_status(200)
            .create_async()
            .await;

        let outcome = probe(Duration::from_secs(5))
            .check(&format!("{}/health", server.url()))
            .await;

        mock.assert_async().await;
        assert_eq!(outcome.status, CheckStatus::Up);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_down() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;

        let outcome = probe(Duration::from_secs(5))
            .check(&format!("{}/", server.url()))
            .await;

        assert_eq!(outcome.status, CheckStatus::Down);
        assert_eq!(outcome.status_code, Some(503));
        assert!(outcome.error_message.unwrap().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn test_not_found_is_down() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let outcome = probe(Duration::from_secs(5))
            .check(&format!("{}/missing", server.url()))
            .await;

        assert_eq!(outcome.status, CheckStatus::Down);
        assert_eq!(outcome.status_code, Some(404));
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        // 绑定后立即释放端口，确保没有监听者
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let outcome = probe(Duration::from_secs(5))
            .check(&format!("http://127.0.0.1:{port}/"))
            .await;

        assert_eq!(outcome.status, CheckStatus::Error);
        assert!(outcome.status_code.is_none());
        assert!(outcome.error_message.is_some());
    }
}
