//! 配置文件监控模块
//!
//! 提供配置文件的实时监控和热重载功能

use crate::config::loader::{ConfigLoader, TomlConfigLoader};
use crate::config::types::Config;
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// 配置变更事件
#[derive(Debug, Clone)]
pub struct ConfigChangeEvent {
    /// 配置文件路径
    pub config_path: PathBuf,
    /// 新配置
    pub new_config: Config,
    /// 变更时间
    pub timestamp: Instant,
    /// 配置版本号
    pub version: u64,
}

/// 配置文件监控器
pub struct ConfigWatcher {
    /// 配置文件路径
    config_path: PathBuf,
    /// 文件系统监控器
    watcher: Option<RecommendedWatcher>,
    /// 配置加载器
    loader: TomlConfigLoader,
    /// 事件发送器
    event_sender: broadcast::Sender<ConfigChangeEvent>,
    /// 防抖动延迟
    debounce_delay: Duration,
}

impl ConfigWatcher {
    /// 创建新的配置监控器
    ///
    /// # 参数
    /// * `config_path` - 配置文件路径
    /// * `debounce_delay` - 防抖动延迟时间
    ///
    /// # 返回
    /// * `Result<(Self, broadcast::Receiver<ConfigChangeEvent>)>` - 监控器和事件接收器
    pub fn new<P: AsRef<Path>>(
        config_path: P,
        debounce_delay: Duration,
    ) -> Result<(Self, broadcast::Receiver<ConfigChangeEvent>)> {
        let config_path = config_path.as_ref().to_path_buf();
        Self::validate_config_path(&config_path)?;

        // 事件里的路径是绝对路径
        let config_path = config_path.canonicalize().unwrap_or(config_path);

        let (event_sender, event_receiver) = broadcast::channel(32);

        let watcher = Self {
            config_path,
            watcher: None,
            loader: TomlConfigLoader::new(true),
            event_sender,
            debounce_delay,
        };

        Ok((watcher, event_receiver))
    }

    /// 验证配置文件路径
    fn validate_config_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(anyhow::anyhow!("配置文件不存在: {}", path.display()));
        }

        if !path.is_file() {
            return Err(anyhow::anyhow!("路径不是文件: {}", path.display()));
        }

        if let Some(extension) = path.extension() {
            if extension != "toml" {
                warn!("配置文件扩展名不是.toml: {}", path.display());
            }
        }

        match std::fs::File::open(path) {
            Ok(_) => {
                debug!("配置文件权限验证通过: {}", path.display());
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!(
                "无法读取配置文件 {}: {}",
                path.display(),
                e
            )),
        }
    }

    /// 启动配置文件监控
    pub fn start(&mut self) -> Result<()> {
        info!("启动配置文件监控: {}", self.config_path.display());

        // notify回调运行在自己的线程上，通过无界通道转交给tokio任务
        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            notify::Config::default().with_poll_interval(Duration::from_secs(1)),
        )
        .context("创建文件监控器失败")?;

        // 监控配置文件所在目录，编辑器常以替换文件的方式保存
        let watch_path = self
            .config_path
            .parent()
            .unwrap_or(&self.config_path)
            .to_path_buf();
        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("监控目录失败: {}", watch_path.display()))?;

        self.watcher = Some(watcher);

        let config_path = self.config_path.clone();
        let event_sender = self.event_sender.clone();
        let loader = self.loader.clone();
        let debounce_delay = self.debounce_delay;

        tokio::spawn(async move {
            Self::handle_file_events(rx, config_path, event_sender, loader, debounce_delay).await;
        });

        info!("配置文件监控已启动");
        Ok(())
    }

    /// 处理文件系统事件
    async fn handle_file_events(
        mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
        config_path: PathBuf,
        event_sender: broadcast::Sender<ConfigChangeEvent>,
        loader: TomlConfigLoader,
        debounce_delay: Duration,
    ) {
        let mut last_event_time: Option<Instant> = None;
        let mut version = 1u64;

        while let Some(res) = rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    error!("文件监控事件错误: {}", e);
                    continue;
                }
            };

            if !Self::is_target_file_event(&event, &config_path) {
                continue;
            }

            debug!("检测到配置文件变更事件: {:?}", event.kind);

            let now = Instant::now();
            if let Some(last_time) = last_event_time {
                if now.duration_since(last_time) < debounce_delay {
                    debug!("跳过重复事件（防抖动）");
                    continue;
                }
            }
            last_event_time = Some(now);

            // 延迟处理，确保文件写入完成
            tokio::time::sleep(debounce_delay).await;

            match Self::reload_config(&loader, &config_path, version).await {
                Ok(change_event) => {
                    info!("配置重载成功，版本: {}", version);
                    version += 1;

                    if let Err(e) = event_sender.send(change_event) {
                        error!("发送配置变更事件失败: {}", e);
                    }
                }
                Err(e) => {
                    // 无效的修改被忽略，继续使用当前配置
                    error!("配置重载失败，保留当前配置: {:#}", e);
                }
            }
        }
    }

    /// 检查是否是目标文件的事件
    fn is_target_file_event(event: &Event, target_path: &Path) -> bool {
        match &event.kind {
            EventKind::Modify(_) | EventKind::Create(_) => event
                .paths
                .iter()
                .any(|path| path == target_path || path.file_name() == target_path.file_name()),
            _ => false,
        }
    }

    /// 重新加载配置
    async fn reload_config(
        loader: &TomlConfigLoader,
        config_path: &Path,
        version: u64,
    ) -> Result<ConfigChangeEvent> {
        debug!("重新加载配置文件: {}", config_path.display());

        let new_config = loader
            .load_from_file(config_path)
            .await
            .context("重新加载配置失败")?;

        Ok(ConfigChangeEvent {
            config_path: config_path.to_path_buf(),
            new_config,
            timestamp: Instant::now(),
            version,
        })
    }

    /// 停止监控
    pub fn stop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            info!("配置文件监控已停止");
        }
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
