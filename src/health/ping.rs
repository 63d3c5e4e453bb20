//! Ping探测器实现
//!
//! 调用系统ping命令发送单个回显请求，并从输出中解析往返时间

use crate::health::result::ProbeOutcome;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// `time=12.3 ms` / `time<1ms`
static SINGLE_RTT: OnceLock<Option<Regex>> = OnceLock::new();
/// `rtt min/avg/max/mdev = 1.0/2.0/3.0/0.5 ms`
static SUMMARY_RTT: OnceLock<Option<Regex>> = OnceLock::new();

fn single_rtt_regex() -> Option<&'static Regex> {
    SINGLE_RTT
        .get_or_init(|| Regex::new(r"(?i)time[=<]\s*(\d+(?:\.\d+)?)\s*ms").ok())
        .as_ref()
}

fn summary_rtt_regex() -> Option<&'static Regex> {
    SUMMARY_RTT
        .get_or_init(|| {
            Regex::new(r"=\s*([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+)\s*ms").ok()
        })
        .as_ref()
}

/// 从ping输出中解析往返时间（毫秒）
///
/// 优先取单次回显的 `time=`，否则取统计行中的平均值
pub fn parse_rtt_ms(output: &str) -> Option<f64> {
    if let Some(caps) = single_rtt_regex().and_then(|re| re.captures(output)) {
        if let Some(ms) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
            return Some(ms);
        }
    }

    summary_rtt_regex()
        .and_then(|re| re.captures(output))
        .and_then(|caps| caps.get(2))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// 往返时间，输出中没有可用的时间时使用实际耗时
pub fn response_time_from_output(output: &str, elapsed: Duration) -> Duration {
    parse_rtt_ms(output)
        .and_then(|ms| Duration::try_from_secs_f64(ms / 1000.0).ok())
        .unwrap_or(elapsed)
}

/// 生成平台相关的ping参数
pub fn ping_args(host: &str, timeout: Duration) -> Vec<String> {
    if cfg!(windows) {
        vec![
            "-n".to_string(),
            "1".to_string(),
            "-w".to_string(),
            timeout.as_millis().to_string(),
            host.to_string(),
        ]
    } else if cfg!(target_os = "linux") {
        let secs = timeout.as_secs_f64().ceil().max(1.0) as u64;
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-W".to_string(),
            secs.to_string(),
            host.to_string(),
        ]
    } else {
        vec!["-c".to_string(), "1".to_string(), host.to_string()]
    }
}

/// Ping探测器
#[derive(Debug, Clone)]
pub struct PingProbe {
    /// 整体超时，超时后子进程会被终止
    timeout: Duration,
    /// ping程序路径
    program: String,
}

impl PingProbe {
    /// 创建新的Ping探测器
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            program: "ping".to_string(),
        }
    }

    /// 指定ping程序
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 超时时间
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 执行一次ping
    ///
    /// 进程无法启动记为出错；退出码非零或超时记为不可用
    pub async fn check(&self, host: &str) -> ProbeOutcome {
        let start_time = Instant::now();

        let child = Command::new(&self.program)
            .args(ping_args(host, self.timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                return ProbeOutcome::error(
                    start_time.elapsed(),
                    format!("Failed to run ping: {e}"),
                )
            }
        };

        // 超时后future被丢弃，kill_on_drop负责回收子进程
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ProbeOutcome::down(start_time.elapsed(), format!("Ping failed: {e}"))
            }
            Err(_) => {
                return ProbeOutcome::down(
                    start_time.elapsed(),
                    format!("Ping timeout after {}ms", self.timeout.as_millis()),
                )
            }
        };

        let elapsed = start_time.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout);
        let response_time = response_time_from_output(&stdout, elapsed);

        if output.status.success() {
            debug!("Ping成功: {} ({:?})", host, response_time);
            ProbeOutcome::up(response_time)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            let message = if detail.is_empty() {
                format!("Ping failed: {}", output.status)
            } else {
                format!("Ping failed: {detail}")
            };
            ProbeOutcome::down(response_time, message)
        }
    }
}
