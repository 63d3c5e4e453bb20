//! 短信发送器
//!
//! 调用Twilio兼容的REST接口发送短信

use crate::config::types::SmsConfig;
use crate::error::NotificationError;
use crate::notification::sender::{AlertPayload, SmsSender};
use crate::notification::template::AlertTemplates;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

/// 接口返回的消息对象（只取需要的字段）
#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: Option<String>,
}

/// Twilio短信发送器
#[derive(Debug, Clone)]
pub struct TwilioSmsSender {
    client: Client,
    config: SmsConfig,
    templates: AlertTemplates,
}

impl TwilioSmsSender {
    /// 创建新的短信发送器
    ///
    /// # 参数
    /// * `config` - 账号配置
    /// * `timeout` - 请求超时
    /// * `templates` - 文本模板
    pub fn new(
        config: SmsConfig,
        timeout: Duration,
        templates: AlertTemplates,
    ) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            config,
            templates,
        })
    }

    /// 消息接口地址
    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send_sms(&self, to: &str, payload: &AlertPayload) -> Result<(), NotificationError> {
        let body = self.templates.render_sms(payload)?;
        debug!("发送短信: {} -> {}", payload.monitor.name, to);

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.from_number.as_str()),
                ("Body", body.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let sid = response
                .json::<MessageResource>()
                .await
                .ok()
                .and_then(|m| m.sid)
                .unwrap_or_default();
            info!("短信发送成功: {} SID: {}", payload.monitor.name, sid);
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            error!("短信发送失败: {} - {}", status, text);
            Err(NotificationError::Rejected {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}
