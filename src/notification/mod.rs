//! 通知模块
//!
//! 提供告警策略、短信与聊天webhook发送和消息模板功能

pub mod dispatcher;
pub mod sender;
pub mod slack;
pub mod sms;
pub mod template;

// 重新导出主要类型
pub use dispatcher::{AlertDispatcher, AlertPolicy, Channel, ChannelOutcome, DispatcherConfig};
pub use sender::{AlertPayload, ChatSender, NoOpSender, SmsSender};
pub use slack::SlackSender;
pub use sms::TwilioSmsSender;
pub use template::AlertTemplates;
