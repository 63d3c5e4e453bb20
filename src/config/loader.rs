//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 配置文件名
pub const CONFIG_FILE_NAME: &str = "uptyne.toml";

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file(&self, path: &Path) -> Result<Config>;

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的 `${VAR}` 环境变量，注释行保持原样
    ///
    /// # 参数
    /// * `content` - 要处理的字符串
    ///
    /// # 返回
    /// * `Result<String>` - 替换后的字符串，变量未设置时返回错误
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

        let mut lines = Vec::new();
        for line in content.lines() {
            if line.trim_start().starts_with('#') {
                lines.push(line.to_string());
                continue;
            }

            let mut result = line.to_string();
            for captures in env_var_regex.captures_iter(line) {
                let full_match = &captures[0];
                let var_name = &captures[1];

                let value = std::env::var(var_name).map_err(|_| ConfigError::EnvVarError {
                    var: var_name.to_string(),
                })?;
                result = result.replace(full_match, &value);
            }
            lines.push(result);
        }

        Ok(lines.join("\n"))
    }

    /// 解析TOML内容
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        Ok(config)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file(&self, path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!(
            "成功加载配置文件: {} ({} 个监控项, {} 个用户)",
            path.display(),
            config.monitors.len(),
            config.users.len()
        );

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `uptyne.toml` 时使用它，否则使用用户配置目录下的 `uptyne/uptyne.toml`
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join("uptyne").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

/// 解析实际使用的配置文件路径，显式指定的优先
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(get_default_config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::dispatcher::AlertPolicy;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const TEST_CONFIG_TOML: &str = r#"
[global]
log_level = "debug"
max_concurrent_checks = 10
alert_policy = "every_failure"

[global.server]
port = 9090

[[users]]
id = "alice"

[users.alerts]
chat_enabled = true
chat_webhook_url = "https://hooks.example.com/alice"

[[monitors]]
id = "api"
user_id = "alice"
name = "API"
url = "https://api.example.com/health"
interval_minutes = 1

[[monitors]]
id = "db"
user_id = "alice"
name = "Database"
url = "tcp://db.internal:5432"
active = false
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
# 令牌来自 ${NOT_SET_IN_COMMENTS}
[global.sms]
account_sid = "${UPTYNE_TEST_SID}"
auth_token = "${UPTYNE_TEST_TOKEN}"
from_number = "+15005550006"
"#;

    #[tokio::test]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.global.max_concurrent_checks, 10);
        assert_eq!(config.global.alert_policy, AlertPolicy::EveryFailure);
        assert_eq!(config.global.server.port, 9090);
        assert_eq!(config.global.server.bind_address, "0.0.0.0");
        assert_eq!(config.monitors.len(), 2);
        assert_eq!(config.monitors[0].interval_minutes, 1);
        assert_eq!(config.monitors[1].interval_minutes, 5);
        assert!(!config.monitors[1].active);
        assert!(config.users[0].alerts.chat_enabled);
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("UPTYNE_TEST_SID", "AC42");
        env::set_var("UPTYNE_TEST_TOKEN", "tok-123");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        let sms = config.global.sms.unwrap();
        assert_eq!(sms.account_sid, "AC42");
        assert_eq!(sms.auth_token, "tok-123");
        assert_eq!(sms.api_base, "https://api.twilio.com");

        env::remove_var("UPTYNE_TEST_SID");
        env::remove_var("UPTYNE_TEST_TOKEN");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("UPTYNE_TEST_SID");

        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(TEST_CONFIG_WITH_ENV_VARS).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("UPTYNE_TEST_SID"));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string(
                r#"
[[monitors]]
id = "x"
user_id = "ghost"
name = "X"
url = "https://x.example.com"
"#,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, TEST_CONFIG_TOML).unwrap();

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(&path).await.unwrap();
        assert_eq!(config.monitors[0].id, "api");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let loader = TomlConfigLoader::new(true);
        let err = loader
            .load_from_file(Path::new("/nonexistent/uptyne.toml"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/uptyne.toml"));
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_resolve_config_path() {
        let explicit = Path::new("/etc/uptyne/custom.toml");
        assert_eq!(resolve_config_path(Some(explicit)), explicit);

        let default = resolve_config_path(None);
        assert!(default.to_string_lossy().ends_with(CONFIG_FILE_NAME));
    }
}
