//! Slack兼容的聊天webhook发送器
//!
//! 以attachments格式发送告警，对端返回非2xx视为失败

use crate::error::NotificationError;
use crate::notification::sender::{AlertPayload, ChatSender};
use crate::notification::template::AlertTemplates;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// 消息页脚
pub const FOOTER: &str = "Uptyne Monitor";

/// 聊天webhook发送器
#[derive(Debug, Clone)]
pub struct SlackSender {
    /// HTTP客户端
    client: Client,
    /// 文本模板
    templates: AlertTemplates,
}

impl SlackSender {
    /// 创建新的webhook发送器
    ///
    /// # 参数
    /// * `timeout` - 请求超时
    /// * `templates` - 文本模板
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 发送器实例
    pub fn new(timeout: Duration, templates: AlertTemplates) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, templates })
    }

    /// 构建消息体
    pub fn build_message_body(&self, payload: &AlertPayload) -> Result<Value, NotificationError> {
        let check = &payload.check;
        let color = if payload.is_recovery() { "good" } else { "danger" };
        let ts = check.checked_at.timestamp();

        let mut fields = vec![
            json!({
                "title": "Status",
                "value": check.status.as_str().to_uppercase(),
                "short": true
            }),
            json!({
                "title": "Response Time",
                "value": format!("{}ms", check.response_time_ms),
                "short": true
            }),
            json!({
                "title": "URL",
                "value": format!("<{0}|{0}>", payload.monitor.url),
                "short": false
            }),
            json!({
                "title": "Status Code",
                "value": check
                    .status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "N/A".to_string()),
                "short": true
            }),
            json!({
                "title": "Checked At",
                "value": format!(
                    "<!date^{}^{{date_pretty}} at {{time}}|{}>",
                    ts,
                    check.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                "short": true
            }),
        ];

        if let Some(error_message) = &check.error_message {
            fields.push(json!({
                "title": "Error",
                "value": error_message,
                "short": false
            }));
        }

        Ok(json!({
            "text": self.templates.render_chat_text(payload)?,
            "attachments": [
                {
                    "color": color,
                    "pretext": self.templates.render_chat_pretext(payload)?,
                    "fields": fields,
                    "footer": FOOTER,
                    "ts": ts
                }
            ]
        }))
    }
}

#[async_trait]
impl ChatSender for SlackSender {
    async fn send_chat_alert(
        &self,
        webhook_url: &str,
        payload: &AlertPayload,
    ) -> Result<(), NotificationError> {
        let body = self.build_message_body(payload)?;
        debug!("发送消息到聊天webhook: {}", payload.monitor.name);

        let response = self.client.post(webhook_url).json(&body).send().await?;

        if response.status().is_success() {
            info!("聊天消息发送成功: {}", payload.monitor.name);
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("聊天消息发送失败: {} - {}", status, text);
            Err(NotificationError::Rejected {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::CheckStatus;
    use crate::notification::sender::{AlertCheck, AlertMonitor};
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;

    fn payload(status: CheckStatus, error: Option<&str>) -> AlertPayload {
        AlertPayload {
            monitor: AlertMonitor {
                name: "API".to_string(),
                url: "https://api.example.com".to_string(),
            },
            check: AlertCheck {
                status,
                status_code: Some(500),
                response_time_ms: 230,
                error_message: error.map(str::to_string),
                checked_at: Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap(),
            },
        }
    }

    fn sender() -> SlackSender {
        SlackSender::new(Duration::from_secs(5), AlertTemplates::default()).unwrap()
    }

    #[test]
    fn test_message_body_down() {
        let body = sender()
            .build_message_body(&payload(CheckStatus::Down, Some("HTTP 500 Internal Server Error")))
            .unwrap();

        assert_eq!(body["text"], "🚨 *API* IS DOWN");
        let attachment = &body["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["footer"], FOOTER);
        assert_eq!(attachment["fields"][0]["value"], "DOWN");
        assert_eq!(attachment["fields"][1]["value"], "230ms");
        assert_eq!(attachment["fields"][3]["value"], "500");
        assert_eq!(attachment["fields"][5]["title"], "Error");
    }

    #[test]
    fn test_message_body_recovery_has_no_error_field() {
        let body = sender()
            .build_message_body(&payload(CheckStatus::Up, None))
            .unwrap();

        assert_eq!(body["text"], "✅ *API* BACK ONLINE");
        assert_eq!(body["attachments"][0]["color"], "good");
        assert_eq!(body["attachments"][0]["fields"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_send_posts_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({"text": "🚨 *API* IS DOWN"})))
            .with_status(200)
            .with_body("ok")
            .create_async()
            .await;

        sender()
            .send_chat_alert(
                &format!("{}/hook", server.url()),
                &payload(CheckStatus::Down, None),
            )
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/hook")
            .with_status(404)
            .with_body("no_service")
            .create_async()
            .await;

        let err = sender()
            .send_chat_alert(
                &format!("{}/hook", server.url()),
                &payload(CheckStatus::Down, None),
            )
            .await
            .unwrap_err();

        match err {
            NotificationError::Rejected { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body, "no_service");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
