//! 存储数据模型
//!
//! 监控项、用户及告警偏好；同样用作配置文件中的条目

use crate::health::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 检测间隔下限（分钟）
pub const MIN_INTERVAL_MINUTES: u32 = 1;
/// 检测间隔上限（分钟）
pub const MAX_INTERVAL_MINUTES: u32 = 60;

/// 监控项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    /// 监控项ID
    pub id: String,
    /// 所属用户
    pub user_id: String,
    /// 显示名称
    pub name: String,
    /// 目标URL，协议决定探测方式
    pub url: String,
    /// 检测间隔（分钟）
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// 是否启用
    #[serde(default = "default_active")]
    pub active: bool,
    /// 创建时间
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// 更新时间
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Monitor {
    /// 创建新的监控项
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        interval_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            name: name.into(),
            url: url.into(),
            interval_minutes,
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    /// 检测间隔
    pub fn interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.interval_minutes))
    }

    /// 目标是否为HTTP(S)，只有这类目标参与域名检测
    pub fn is_http_target(&self) -> bool {
        Target::parse(&self.url)
            .map(|t| t.is_http())
            .unwrap_or(false)
    }

    /// 校验监控项
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("监控项ID不能为空".to_string());
        }
        if self.name.trim().is_empty() {
            return Err(format!("监控项名称不能为空: {}", self.id));
        }
        if !(MIN_INTERVAL_MINUTES..=MAX_INTERVAL_MINUTES).contains(&self.interval_minutes) {
            return Err(format!(
                "检测间隔必须在{}-{}分钟之间: {} ({})",
                MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES, self.id, self.interval_minutes
            ));
        }
        Target::parse(&self.url).map_err(|e| format!("监控项 {} 的URL无效: {}", self.id, e))?;
        Ok(())
    }
}

/// 用户告警偏好
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPreference {
    /// 是否启用短信告警
    #[serde(default)]
    pub sms_enabled: bool,
    /// 手机号（E.164）
    #[serde(default)]
    pub phone_number: Option<String>,
    /// 是否启用聊天webhook告警
    #[serde(default)]
    pub chat_enabled: bool,
    /// webhook地址
    #[serde(default)]
    pub chat_webhook_url: Option<String>,
}

impl AlertPreference {
    /// 已启用且有号码时返回手机号
    pub fn sms_target(&self) -> Option<&str> {
        self.phone_number
            .as_deref()
            .filter(|n| self.sms_enabled && !n.trim().is_empty())
    }

    /// 已启用且有地址时返回webhook地址
    pub fn chat_target(&self) -> Option<&str> {
        self.chat_webhook_url
            .as_deref()
            .filter(|u| self.chat_enabled && !u.trim().is_empty())
    }

    /// 校验偏好设置
    pub fn validate(&self) -> Result<(), String> {
        if self.sms_enabled {
            match self.phone_number.as_deref() {
                Some(number) if is_e164(number) => {}
                Some(number) => return Err(format!("手机号不是E.164格式: {number}")),
                None => return Err("启用短信告警时必须配置手机号".to_string()),
            }
        }
        if self.chat_enabled {
            match self.chat_webhook_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => return Err(format!("webhook地址必须以http://或https://开头: {url}")),
                None => return Err("启用聊天告警时必须配置webhook地址".to_string()),
            }
        }
        Ok(())
    }
}

/// 用户
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// 用户ID
    pub id: String,
    /// 告警偏好
    #[serde(default)]
    pub alerts: AlertPreference,
}

/// 判断号码是否为E.164格式：`+` 加最多15位数字，首位非0
pub fn is_e164(number: &str) -> bool {
    let Some(digits) = number.strip_prefix('+') else {
        return false;
    };
    (2..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0')
}

fn default_interval_minutes() -> u32 {
    5
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_defaults_from_toml() {
        let monitor: Monitor = toml::from_str(
            r#"
            id = "api"
            user_id = "alice"
            name = "API"
            url = "https://api.example.com/health"
            "#,
        )
        .unwrap();

        assert_eq!(monitor.interval_minutes, 5);
        assert!(monitor.active);
        assert!(monitor.created_at.is_none());
        assert!(monitor.is_http_target());
        assert!(monitor.validate().is_ok());
    }

    #[test]
    fn test_monitor_interval_bounds() {
        let mut monitor = Monitor::new("m", "u", "M", "tcp://db:5432", 0);
        assert!(monitor.validate().is_err());
        monitor.interval_minutes = 61;
        assert!(monitor.validate().is_err());
        monitor.interval_minutes = 60;
        assert!(monitor.validate().is_ok());
        assert!(!monitor.is_http_target());
    }

    #[test]
    fn test_monitor_rejects_bad_url() {
        let monitor = Monitor::new("m", "u", "M", "gopher://old.example", 5);
        assert!(monitor.validate().unwrap_err().contains("URL"));
    }

    #[test]
    fn test_e164() {
        assert!(is_e164("+14155552671"));
        assert!(is_e164("+8613800138000"));
        assert!(!is_e164("14155552671"));
        assert!(!is_e164("+0123"));
        assert!(!is_e164("+1 415 555"));
        assert!(!is_e164("+1234567890123456"));
    }

    #[test]
    fn test_alert_preference_targets() {
        let pref = AlertPreference {
            sms_enabled: false,
            phone_number: Some("+14155552671".to_string()),
            chat_enabled: true,
            chat_webhook_url: Some("https://hooks.example.com/x".to_string()),
        };
        assert_eq!(pref.sms_target(), None);
        assert_eq!(pref.chat_target(), Some("https://hooks.example.com/x"));
        assert!(pref.validate().is_ok());

        let pref = AlertPreference {
            sms_enabled: true,
            phone_number: Some("555-0100".to_string()),
            ..Default::default()
        };
        assert!(pref.validate().is_err());
    }
}
