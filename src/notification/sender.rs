//! 通知发送器模块
//!
//! 定义告警内容和短信、聊天两类发送器接口

use crate::error::NotificationError;
use crate::health::result::{CheckResult, CheckStatus};
use crate::store::models::Monitor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 告警中的监控项信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertMonitor {
    /// 显示名称
    pub name: String,
    /// 目标URL
    pub url: String,
}

/// 告警中的检测结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertCheck {
    /// 检测状态
    pub status: CheckStatus,
    /// 协议状态码
    pub status_code: Option<u16>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
    /// 错误信息
    pub error_message: Option<String>,
    /// 检测时间
    pub checked_at: DateTime<Utc>,
}

/// 告警内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertPayload {
    /// 监控项
    pub monitor: AlertMonitor,
    /// 检测结果
    pub check: AlertCheck,
}

impl AlertPayload {
    /// 由监控项和检测记录生成告警内容
    pub fn new(monitor: &Monitor, check: &CheckResult) -> Self {
        Self {
            monitor: AlertMonitor {
                name: monitor.name.clone(),
                url: monitor.url.clone(),
            },
            check: AlertCheck {
                status: check.status,
                status_code: check.status_code,
                response_time_ms: check.response_time_ms,
                error_message: check.error_message.clone(),
                checked_at: check.checked_at,
            },
        }
    }

    /// 是否为恢复通知
    pub fn is_recovery(&self) -> bool {
        self.check.status.is_healthy()
    }
}

/// 短信发送器trait
#[async_trait]
pub trait SmsSender: Send + Sync {
    /// 发送短信告警
    ///
    /// # 参数
    /// * `to` - 接收号码（E.164）
    /// * `payload` - 告警内容
    ///
    /// # 返回
    /// * `Result<(), NotificationError>` - 传输失败时返回错误
    async fn send_sms(&self, to: &str, payload: &AlertPayload) -> Result<(), NotificationError>;
}

/// 聊天webhook发送器trait
#[async_trait]
pub trait ChatSender: Send + Sync {
    /// 发送聊天告警
    ///
    /// # 参数
    /// * `webhook_url` - webhook地址
    /// * `payload` - 告警内容
    ///
    /// # 返回
    /// * `Result<(), NotificationError>` - 对端返回非2xx时返回错误
    async fn send_chat_alert(
        &self,
        webhook_url: &str,
        payload: &AlertPayload,
    ) -> Result<(), NotificationError>;
}

/// 空的通知发送器实现（用于测试或禁用通知）
pub struct NoOpSender;

#[async_trait]
impl SmsSender for NoOpSender {
    async fn send_sms(&self, _to: &str, _payload: &AlertPayload) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[async_trait]
impl ChatSender for NoOpSender {
    async fn send_chat_alert(
        &self,
        _webhook_url: &str,
        _payload: &AlertPayload,
    ) -> Result<(), NotificationError> {
        Ok(())
    }
}
