//! 消息模板模块
//!
//! 使用Handlebars渲染告警文本

use crate::error::NotificationError;
use crate::notification::sender::AlertPayload;
use handlebars::Handlebars;
use serde::Serialize;

/// 模板名：短信正文
pub const SMS_TEMPLATE: &str = "sms";
/// 模板名：聊天消息标题
pub const CHAT_TEXT_TEMPLATE: &str = "chat_text";
/// 模板名：聊天消息附件前言
pub const CHAT_PRETEXT_TEMPLATE: &str = "chat_pretext";

/// 默认的短信模板
pub const DEFAULT_SMS_TEMPLATE: &str = "{{emoji}} Monitor Alert: {{monitor_name}}
Status: {{status_upper}}
URL: {{monitor_url}}
Response Time: {{response_time}}ms{{#if status_code}}
Status Code: {{status_code}}{{/if}}{{#if error_message}}
Error: {{error_message}}{{/if}}";

/// 默认的聊天消息标题模板
pub const DEFAULT_CHAT_TEXT_TEMPLATE: &str = "{{emoji}} *{{monitor_name}}* {{status_text}}";

/// 默认的聊天消息附件前言模板
pub const DEFAULT_CHAT_PRETEXT_TEMPLATE: &str = "Monitor *{{monitor_name}}* {{status_text_lower}}";

/// 模板上下文数据
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// 监控项名称
    pub monitor_name: String,
    /// 监控项URL
    pub monitor_url: String,
    /// 状态（小写）
    pub status: String,
    /// 状态（大写）
    pub status_upper: String,
    /// ✅ 或 🚨
    pub emoji: &'static str,
    /// BACK ONLINE 或 IS DOWN
    pub status_text: &'static str,
    /// 小写的状态描述
    pub status_text_lower: String,
    /// 响应时间（毫秒）
    pub response_time: u64,
    /// 协议状态码
    pub status_code: Option<u16>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 检测时间（RFC 3339）
    pub checked_at: String,
}

impl From<&AlertPayload> for TemplateContext {
    fn from(payload: &AlertPayload) -> Self {
        let recovery = payload.is_recovery();
        let status_text = if recovery { "BACK ONLINE" } else { "IS DOWN" };
        Self {
            monitor_name: payload.monitor.name.clone(),
            monitor_url: payload.monitor.url.clone(),
            status: payload.check.status.as_str().to_string(),
            status_upper: payload.check.status.as_str().to_uppercase(),
            emoji: if recovery { "✅" } else { "🚨" },
            status_text,
            status_text_lower: status_text.to_lowercase(),
            response_time: payload.check.response_time_ms,
            status_code: payload.check.status_code,
            error_message: payload.check.error_message.clone(),
            checked_at: payload.check.checked_at.to_rfc3339(),
        }
    }
}

/// 告警文本模板集合
#[derive(Debug, Clone)]
pub struct AlertTemplates {
    registry: Handlebars<'static>,
}

impl AlertTemplates {
    /// 使用自定义模板创建
    ///
    /// # 参数
    /// * `sms` - 短信正文模板
    /// * `chat_text` - 聊天消息标题模板
    /// * `chat_pretext` - 聊天附件前言模板
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - 模板语法错误时返回错误
    pub fn new(sms: &str, chat_text: &str, chat_pretext: &str) -> Result<Self, NotificationError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);

        for (name, source) in [
            (SMS_TEMPLATE, sms),
            (CHAT_TEXT_TEMPLATE, chat_text),
            (CHAT_PRETEXT_TEMPLATE, chat_pretext),
        ] {
            registry
                .register_template_string(name, source)
                .map_err(|e| NotificationError::TemplateError(format!("{name}: {e}")))?;
        }

        Ok(Self { registry })
    }

    /// 渲染指定模板
    pub fn render(&self, name: &str, payload: &AlertPayload) -> Result<String, NotificationError> {
        let context = TemplateContext::from(payload);
        self.registry
            .render(name, &context)
            .map_err(|e| NotificationError::TemplateError(format!("{name}: {e}")))
    }

    /// 渲染短信正文
    pub fn render_sms(&self, payload: &AlertPayload) -> Result<String, NotificationError> {
        self.render(SMS_TEMPLATE, payload)
    }

    /// 渲染聊天消息标题
    pub fn render_chat_text(&self, payload: &AlertPayload) -> Result<String, NotificationError> {
        self.render(CHAT_TEXT_TEMPLATE, payload)
    }

    /// 渲染聊天附件前言
    pub fn render_chat_pretext(&self, payload: &AlertPayload) -> Result<String, NotificationError> {
        self.render(CHAT_PRETEXT_TEMPLATE, payload)
    }
}

impl Default for AlertTemplates {
    fn default() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        for (name, source) in [
            (SMS_TEMPLATE, DEFAULT_SMS_TEMPLATE),
            (CHAT_TEXT_TEMPLATE, DEFAULT_CHAT_TEXT_TEMPLATE),
            (CHAT_PRETEXT_TEMPLATE, DEFAULT_CHAT_PRETEXT_TEMPLATE),
        ] {
            // 内置模板在测试中校验过语法
            if let Err(e) = registry.register_template_string(name, source) {
                tracing::error!("内置模板注册失败: {}: {}", name, e);
            }
        }
        Self { registry }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::result::CheckStatus;
    use crate::notification::sender::{AlertCheck, AlertMonitor};
    use chrono::{TimeZone, Utc};

    fn payload(status: CheckStatus, status_code: Option<u16>, error: Option<&str>) -> AlertPayload {
        AlertPayload {
            monitor: AlertMonitor {
                name: "Shop & Cart".to_string(),
                url: "https://shop.example.com".to_string(),
            },
            check: AlertCheck {
                status,
                status_code,
                response_time_ms: 812,
                error_message: error.map(str::to_string),
                checked_at: Utc.with_ymd_and_hms(2026, 4, 2, 8, 30, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_builtin_templates_compile() {
        assert!(AlertTemplates::new(
            DEFAULT_SMS_TEMPLATE,
            DEFAULT_CHAT_TEXT_TEMPLATE,
            DEFAULT_CHAT_PRETEXT_TEMPLATE
        )
        .is_ok());
    }

    #[test]
    fn test_sms_down_with_details() {
        let text = AlertTemplates::default()
            .render_sms(&payload(
                CheckStatus::Down,
                Some(503),
                Some("HTTP 503 Service Unavailable"),
            ))
            .unwrap();

        assert_eq!(
            text,
            "🚨 Monitor Alert: Shop & Cart\n\
Status: DOWN\n\
URL: https://shop.example.com\n\
Response Time: 812ms\n\
Status Code: 503\n\
Error: HTTP 503 Service Unavailable"
        );
    }

    #[test]
    fn test_sms_recovery_omits_missing_fields() {
        let text = AlertTemplates::default()
            .render_sms(&payload(CheckStatus::Up, None, None))
            .unwrap();

        assert!(text.starts_with("✅ Monitor Alert: Shop & Cart"));
        assert!(text.ends_with("Response Time: 812ms"));
        assert!(!text.contains("Status Code"));
    }

    #[test]
    fn test_chat_text() {
        let templates = AlertTemplates::default();
        let down = payload(CheckStatus::Error, None, Some("Request timeout"));
        assert_eq!(
            templates.render_chat_text(&down).unwrap(),
            "🚨 *Shop & Cart* IS DOWN"
        );
        assert_eq!(
            templates.render_chat_pretext(&down).unwrap(),
            "Monitor *Shop & Cart* is down"
        );
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let err = AlertTemplates::new("{{#if status_code}}unclosed", "x", "y").unwrap_err();
        assert!(matches!(err, NotificationError::TemplateError(_)));
    }
}
