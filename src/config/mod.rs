//! 配置管理模块
//!
//! 提供配置文件解析、验证和热重载功能

pub mod loader;
pub mod types;
pub mod watcher;

// 重新导出主要类型
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader, TomlConfigLoader};
pub use types::{validate_config, Config, GlobalConfig, ServerConfig, SmsConfig, TemplateConfig};
pub use watcher::{ConfigChangeEvent, ConfigWatcher};
