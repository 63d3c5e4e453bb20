//! 检测结果数据结构
//!
//! 定义探测结果、检测记录和状态枚举

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// 检测状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    /// 目标正常
    Up,
    /// 目标不可用（HTTP 4xx/5xx、端口不通、ping无响应）
    Down,
    /// 探测本身出错（传输层失败、URL非法、进程无法启动）
    Error,
}

impl CheckStatus {
    /// 小写字符串形式
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Up => "up",
            CheckStatus::Down => "down",
            CheckStatus::Error => "error",
        }
    }

    /// 判断状态是否为健康
    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckStatus::Up)
    }

    /// 判断状态是否需要告警
    pub fn needs_alert(&self) -> bool {
        matches!(self, CheckStatus::Down | CheckStatus::Error)
    }
}

impl std::fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单次探测的标准化结果（尚未关联到监控项）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// 检测状态
    pub status: CheckStatus,
    /// 响应时间
    pub response_time: Duration,
    /// 协议状态码（仅HTTP）
    pub status_code: Option<u16>,
    /// 错误信息
    pub error_message: Option<String>,
}

impl ProbeOutcome {
    /// 创建新的探测结果
    pub fn new(status: CheckStatus, response_time: Duration) -> Self {
        Self {
            status,
            response_time,
            status_code: None,
            error_message: None,
        }
    }

    /// 正常
    pub fn up(response_time: Duration) -> Self {
        Self::new(CheckStatus::Up, response_time)
    }

    /// 不可用
    pub fn down(response_time: Duration, error_message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Down, response_time).with_error(error_message)
    }

    /// 探测出错
    pub fn error(response_time: Duration, error_message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, response_time).with_error(error_message)
    }

    /// 设置状态码
    pub fn with_status_code(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// 设置错误信息
    pub fn with_error(mut self, error_message: impl Into<String>) -> Self {
        self.error_message = Some(error_message.into());
        self
    }

    /// 获取响应时间（毫秒）
    pub fn response_time_ms(&self) -> u64 {
        self.response_time.as_millis() as u64
    }
}

/// 检测记录，写入后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// 记录ID
    pub id: Uuid,
    /// 所属监控项
    pub monitor_id: String,
    /// 检测状态
    pub status: CheckStatus,
    /// 响应时间（毫秒）
    #[serde(rename = "response_time")]
    pub response_time_ms: u64,
    /// 协议状态码
    pub status_code: Option<u16>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 检测时间
    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    /// 由探测结果生成检测记录
    ///
    /// # 参数
    /// * `monitor_id` - 监控项ID
    /// * `outcome` - 探测结果
    /// * `checked_at` - 检测时间
    pub fn from_outcome(
        monitor_id: impl Into<String>,
        outcome: ProbeOutcome,
        checked_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            monitor_id: monitor_id.into(),
            status: outcome.status,
            response_time_ms: outcome.response_time_ms(),
            status_code: outcome.status_code,
            error_message: outcome.error_message,
            checked_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_flags() {
        assert!(CheckStatus::Up.is_healthy());
        assert!(!CheckStatus::Down.is_healthy());
        assert!(!CheckStatus::Error.is_healthy());

        assert!(!CheckStatus::Up.needs_alert());
        assert!(CheckStatus::Down.needs_alert());
        assert!(CheckStatus::Error.needs_alert());
    }

    #[test]
    fn test_outcome_builders() {
        let outcome = ProbeOutcome::down(Duration::from_millis(5000), "TCP timeout after 5000ms");
        assert_eq!(outcome.status, CheckStatus::Down);
        assert_eq!(outcome.response_time_ms(), 5000);
        assert_eq!(
            outcome.error_message.as_deref(),
            Some("TCP timeout after 5000ms")
        );

        let outcome = ProbeOutcome::up(Duration::from_millis(120)).with_status_code(200);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error_message.is_none());
    }

    #[test]
    fn test_check_result_serialization_uses_store_field_names() {
        let outcome = ProbeOutcome::up(Duration::from_millis(120)).with_status_code(200);
        let result = CheckResult::from_outcome("api", outcome, Utc::now());

        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "up");
        assert_eq!(json["response_time"], 120);
        assert_eq!(json["status_code"], 200);
        assert_eq!(json["monitor_id"], "api");
        assert!(json["error_message"].is_null());
    }
}
