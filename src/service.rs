//! 服务管理模块
//!
//! 负责组件初始化、Web服务、自触发定时器、配置热重载和关闭流程

use crate::config::{ConfigLoader, ConfigWatcher, TomlConfigLoader};
use crate::config::types::Config;
use crate::domain::DomainChecker;
use crate::health::{CheckScheduler, ProbeSet};
use crate::notification::AlertDispatcher;
use crate::recorder::Recorder;
use crate::store::MemoryStore;
use crate::web::{AppState, WebServer};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// 配置文件变更的防抖动延迟
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// 检测引擎组件
#[derive(Clone)]
pub struct EngineComponents {
    /// 内存存储，热重载时替换其中的监控项和用户
    pub store: Arc<MemoryStore>,
    /// 检测调度器
    pub scheduler: Arc<CheckScheduler>,
}

/// 服务启动器
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 加载和验证配置
    pub async fn load_and_validate_config(config_path: &Path) -> Result<Config> {
        info!("加载配置文件: {}", config_path.display());

        let config = TomlConfigLoader::new(true)
            .load_from_file(config_path)
            .await
            .context("加载配置文件失败")?;

        info!(
            "配置加载成功，共 {} 个监控项, {} 个用户",
            config.monitors.len(),
            config.users.len()
        );
        Ok(config)
    }

    /// 按配置组装检测引擎
    pub async fn build_components(config: &Config) -> Result<EngineComponents> {
        let global = &config.global;

        let store = match &global.state_file {
            Some(path) => MemoryStore::with_snapshot(path)
                .await
                .context("加载状态快照失败")?,
            None => MemoryStore::new(),
        };
        let store = Arc::new(store.with_retention(global.history_retention));
        store
            .replace_roster(config.monitors.clone(), config.users.clone())
            .await;

        let probes = ProbeSet::new(&global.probe_settings()).context("创建探测器失败")?;
        let domains =
            DomainChecker::system(global.domain_settings()).context("创建域名检测器失败")?;
        let recorder = Recorder::new(store.clone(), global.uptime_window);
        let dispatcher = AlertDispatcher::new(global.dispatcher_config()?)
            .context("创建告警分发器失败")?;
        info!("告警策略: {}", dispatcher.policy());

        let scheduler = CheckScheduler::new(
            store.clone(),
            Arc::new(probes),
            Arc::new(domains),
            Arc::new(recorder),
            Arc::new(dispatcher),
            global.engine_settings(),
        )
        .with_snapshot_store(store.clone());

        Ok(EngineComponents {
            store,
            scheduler: Arc::new(scheduler),
        })
    }

    /// 运行服务直到收到中断信号
    ///
    /// # 参数
    /// * `config_path` - 配置文件路径，用于热重载
    /// * `config` - 已加载的配置
    /// * `self_trigger` - 是否由服务自身定时触发检测
    pub async fn serve(config_path: PathBuf, config: Config, self_trigger: bool) -> Result<()> {
        let components = Self::build_components(&config).await?;
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        // 设置Ctrl+C信号处理
        let signal_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("收到中断信号，正在停止服务...");
                    let _ = signal_tx.send(());
                }
                Err(err) => error!("监听中断信号失败: {}", err),
            }
        });

        let _watcher = Self::setup_config_hot_reload(&config_path, &components);

        let trigger_handle = if self_trigger || config.global.server.self_trigger {
            Some(Self::start_self_trigger(
                components.scheduler.clone(),
                Duration::from_secs(config.global.server.tick_seconds),
                shutdown_tx.subscribe(),
            ))
        } else {
            info!("未启用自触发，等待外部定时器调用触发端点");
            None
        };

        let mut web_shutdown = shutdown_tx.subscribe();
        let server = WebServer::new(
            config.global.server.clone(),
            AppState::new(components.scheduler.clone()),
        );
        let result = server
            .run(async move {
                let _ = web_shutdown.recv().await;
            })
            .await;

        // Web服务异常退出时也要停止定时器
        let _ = shutdown_tx.send(());
        if let Some(handle) = trigger_handle {
            if let Err(e) = handle.await {
                error!("自触发任务停止时出错: {}", e);
            }
        }

        if let Err(e) = components.store.save_snapshot().await {
            error!("关闭前写入快照失败: {}", e);
        }

        info!("服务已停止");
        result
    }

    /// 启动自触发定时器，每个周期依次执行协议检测和域名检测
    pub fn start_self_trigger(
        scheduler: Arc<CheckScheduler>,
        tick: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        info!("启用自触发，间隔 {} 秒", tick.as_secs());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = chrono::Utc::now();
                        if let Err(e) = scheduler.run_monitor_pass(now).await {
                            error!("检测调度失败: {}", e);
                        }
                        if let Err(e) = scheduler.run_domain_pass(now).await {
                            error!("域名检测调度失败: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("自触发定时器已停止");
                        break;
                    }
                }
            }
        })
    }

    /// 设置配置热重载
    ///
    /// 新配置中的监控项和告警偏好立即生效，全局设置需要重启
    pub fn setup_config_hot_reload(
        config_path: &Path,
        components: &EngineComponents,
    ) -> Option<ConfigWatcher> {
        let (mut watcher, mut rx) = match ConfigWatcher::new(config_path, RELOAD_DEBOUNCE) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("无法监控配置文件，热重载已禁用: {:#}", e);
                return None;
            }
        };

        if let Err(e) = watcher.start() {
            warn!("启动配置监控失败，热重载已禁用: {:#}", e);
            return None;
        }

        let store = components.store.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        let config = event.new_config;
                        let monitors = config.monitors.len();
                        store.replace_roster(config.monitors, config.users).await;
                        info!(
                            "配置已重载 (版本 {}): {} 个监控项，全局设置的修改需重启后生效",
                            event.version, monitors
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("跳过了 {} 个配置变更事件", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Some(watcher)
    }
}
