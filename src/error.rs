//! 错误处理模块
//!
//! 定义应用程序的统一错误类型

use thiserror::Error;

/// Uptyne 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum UptyneError {
    /// 配置相关错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 检测目标解析错误
    #[error("检测目标错误: {0}")]
    Target(#[from] TargetError),

    /// 存储相关错误
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),

    /// 通知相关错误
    #[error("通知错误: {0}")]
    Notification(#[from] NotificationError),

    /// IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON序列化/反序列化错误
    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 其他错误
    #[error("其他错误: {0}")]
    Other(#[from] anyhow::Error),
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 配置文件解析错误
    #[error("配置文件解析失败: {0}")]
    ParseError(String),

    /// 配置验证错误
    #[error("配置验证失败: {0}")]
    ValidationError(String),

    /// 配置文件不存在
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    /// 环境变量替换错误
    #[error("环境变量替换失败: {var}")]
    EnvVarError { var: String },
}

/// 检测目标错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    /// URL无法解析
    #[error("无效的URL: {0}")]
    Malformed(String),

    /// 不支持的协议
    #[error("不支持的协议: {0}")]
    UnsupportedScheme(String),

    /// 缺少主机名
    #[error("URL缺少主机名: {0}")]
    MissingHost(String),

    /// 端口无效
    #[error("无效的端口: {0}")]
    InvalidPort(String),

    /// 主机名无效
    #[error("无效的主机名: {0}")]
    InvalidHost(String),
}

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StoreError {
    /// 写入失败
    #[error("写入失败: {0}")]
    InsertFailed(String),

    /// 读取失败
    #[error("读取失败: {0}")]
    ReadFailed(String),

    /// 快照读写失败
    #[error("快照失败: {path}: {reason}")]
    Snapshot { path: String, reason: String },
}

/// 通知错误类型
#[derive(Error, Debug)]
pub enum NotificationError {
    /// 发送失败（传输层）
    #[error("通知发送失败: {0}")]
    SendError(String),

    /// 对端返回非2xx
    #[error("通知被拒绝: HTTP {status} {body}")]
    Rejected { status: u16, body: String },

    /// 模板渲染错误
    #[error("模板渲染失败: {0}")]
    TemplateError(String),

    /// 配置错误
    #[error("通知配置错误: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for NotificationError {
    fn from(e: reqwest::Error) -> Self {
        NotificationError::SendError(e.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, UptyneError>;
