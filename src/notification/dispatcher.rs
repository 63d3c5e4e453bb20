//! 告警分发器
//!
//! 决定是否需要告警，并把告警并发发送到用户启用的所有通道

use crate::config::types::SmsConfig;
use crate::error::NotificationError;
use crate::health::result::{CheckResult, CheckStatus};
use crate::notification::sender::{AlertPayload, ChatSender, SmsSender};
use crate::notification::slack::SlackSender;
use crate::notification::sms::TwilioSmsSender;
use crate::notification::template::AlertTemplates;
use crate::store::models::{AlertPreference, Monitor};
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 告警策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// 只在健康与不健康之间切换时告警，首次检测即不健康也告警
    #[default]
    Transition,
    /// 每次不健康都告警，恢复时也告警
    EveryFailure,
}

impl AlertPolicy {
    /// 判断本次结果是否需要告警
    ///
    /// # 参数
    /// * `previous` - 上一次检测状态，从未检测时为空
    /// * `current` - 本次检测状态
    pub fn should_alert(&self, previous: Option<CheckStatus>, current: CheckStatus) -> bool {
        let recovered = current.is_healthy() && previous.is_some_and(|p| !p.is_healthy());
        match self {
            AlertPolicy::Transition => match previous {
                None => current.needs_alert(),
                Some(previous) => previous.is_healthy() != current.is_healthy(),
            },
            AlertPolicy::EveryFailure => current.needs_alert() || recovered,
        }
    }
}

impl fmt::Display for AlertPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertPolicy::Transition => write!(f, "transition"),
            AlertPolicy::EveryFailure => write!(f, "every_failure"),
        }
    }
}

/// 告警通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// 短信
    Sms,
    /// 聊天webhook
    Chat,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::Chat => write!(f, "chat"),
        }
    }
}

/// 单个通道的发送结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    /// 通道
    pub channel: Channel,
    /// 是否送达
    pub delivered: bool,
    /// 失败原因
    pub error: Option<String>,
}

impl ChannelOutcome {
    fn from_result(channel: Channel, result: Result<(), NotificationError>) -> Self {
        match result {
            Ok(()) => Self {
                channel,
                delivered: true,
                error: None,
            },
            Err(e) => Self {
                channel,
                delivered: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// 分发器配置
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// 告警策略
    pub policy: AlertPolicy,
    /// 短信服务配置，未配置时跳过短信通道
    pub sms: Option<SmsConfig>,
    /// 发送请求超时
    pub request_timeout: Duration,
    /// 文本模板
    pub templates: AlertTemplates,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            policy: AlertPolicy::default(),
            sms: None,
            request_timeout: Duration::from_secs(30),
            templates: AlertTemplates::default(),
        }
    }
}

/// 告警分发器
#[derive(Clone)]
pub struct AlertDispatcher {
    policy: AlertPolicy,
    sms: Option<Arc<dyn SmsSender>>,
    chat: Arc<dyn ChatSender>,
}

impl AlertDispatcher {
    /// 按配置创建分发器
    ///
    /// # 参数
    /// * `config` - 分发器配置
    ///
    /// # 返回
    /// * `Result<Self, NotificationError>` - HTTP客户端构建失败时返回错误
    pub fn new(config: DispatcherConfig) -> Result<Self, NotificationError> {
        let sms: Option<Arc<dyn SmsSender>> = match config.sms {
            Some(sms_config) => Some(Arc::new(TwilioSmsSender::new(
                sms_config,
                config.request_timeout,
                config.templates.clone(),
            )?)),
            None => None,
        };
        let chat = Arc::new(SlackSender::new(config.request_timeout, config.templates)?);

        Ok(Self::with_senders(config.policy, sms, chat))
    }

    /// 使用指定的发送器创建分发器
    pub fn with_senders(
        policy: AlertPolicy,
        sms: Option<Arc<dyn SmsSender>>,
        chat: Arc<dyn ChatSender>,
    ) -> Self {
        Self { policy, sms, chat }
    }

    /// 告警策略
    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    /// 按策略决定是否告警，需要时发送
    ///
    /// # 参数
    /// * `monitor` - 监控项
    /// * `check` - 本次检测记录
    /// * `previous` - 上一次检测状态
    /// * `preference` - 监控项所属用户的告警偏好
    ///
    /// # 返回
    /// * `Vec<ChannelOutcome>` - 各通道结果，不需要告警时为空
    pub async fn maybe_alert(
        &self,
        monitor: &Monitor,
        check: &CheckResult,
        previous: Option<CheckStatus>,
        preference: Option<&AlertPreference>,
    ) -> Vec<ChannelOutcome> {
        if !self.policy.should_alert(previous, check.status) {
            debug!(
                "无需告警: {} {:?} -> {}",
                monitor.name, previous, check.status
            );
            return Vec::new();
        }

        let Some(preference) = preference else {
            debug!("用户 {} 没有告警偏好，跳过告警", monitor.user_id);
            return Vec::new();
        };

        info!(
            "触发告警: {} {:?} -> {} (策略: {})",
            monitor.name, previous, check.status, self.policy
        );
        self.dispatch(&AlertPayload::new(monitor, check), preference)
            .await
    }

    /// 把告警并发发送到所有启用的通道
    ///
    /// 各通道互不影响，一个通道失败不会取消其他通道
    pub async fn dispatch(
        &self,
        payload: &AlertPayload,
        preference: &AlertPreference,
    ) -> Vec<ChannelOutcome> {
        let mut sends: Vec<BoxFuture<'_, ChannelOutcome>> = Vec::new();

        if let Some(phone_number) = preference.sms_target() {
            match &self.sms {
                Some(sms) => {
                    let sms = Arc::clone(sms);
                    sends.push(
                        async move {
                            ChannelOutcome::from_result(
                                Channel::Sms,
                                sms.send_sms(phone_number, payload).await,
                            )
                        }
                        .boxed(),
                    );
                }
                None => warn!("用户启用了短信告警，但未配置短信服务，跳过"),
            }
        }

        if let Some(webhook_url) = preference.chat_target() {
            let chat = Arc::clone(&self.chat);
            sends.push(
                async move {
                    ChannelOutcome::from_result(
                        Channel::Chat,
                        chat.send_chat_alert(webhook_url, payload).await,
                    )
                }
                .boxed(),
            );
        }

        if sends.is_empty() {
            debug!("没有启用的告警通道: {}", payload.monitor.name);
            return Vec::new();
        }

        let outcomes = join_all(sends).await;
        for outcome in &outcomes {
            match &outcome.error {
                None => info!("告警已发送: {} via {}", payload.monitor.name, outcome.channel),
                Some(e) => warn!(
                    "告警发送失败: {} via {}: {}",
                    payload.monitor.name, outcome.channel, e
                ),
            }
        }
        outcomes
    }
}
