//! 检测调度器模块
//!
//! 每次触发时遍历启用的监控项，选出到期的项并发探测，记录结果并按策略告警

use crate::domain::checker::{normalize_domain, DomainChecker};
use crate::domain::result::DomainCheckResult;
use crate::error::StoreError;
use crate::health::checker::ProtocolProbe;
use crate::health::result::{CheckStatus, ProbeOutcome};
use crate::health::target::Target;
use crate::notification::dispatcher::AlertDispatcher;
use crate::recorder::Recorder;
use crate::store::{MemoryStore, Monitor, MonitorStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// 探测超时之外额外给出的宽限时间
pub const DEFAULT_PROBE_GRACE: Duration = Duration::from_secs(5);

/// 外层截止时间：探测超时加宽限，溢出时取最大值
pub fn deadline_for(timeout: Duration, grace: Duration) -> Duration {
    timeout.saturating_add(grace)
}

/// 判断检测是否到期
///
/// 从未检测过，或距上次检测已满一个间隔时到期
///
/// # 参数
/// * `interval` - 检测间隔
/// * `last_checked` - 上次检测时间
/// * `now` - 当前时间
pub fn is_due(
    interval: chrono::Duration,
    last_checked: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    match last_checked {
        None => true,
        Some(last) => now - last >= interval,
    }
}

/// 调度参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 同时进行的最大检测数
    pub max_concurrent_checks: usize,
    /// 域名检测间隔
    pub domain_check_interval: chrono::Duration,
    /// 外层截止时间的宽限
    pub probe_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_checks: 20,
            domain_check_interval: chrono::Duration::hours(24),
            probe_grace: DEFAULT_PROBE_GRACE,
        }
    }
}

/// 一次调度的汇总
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    /// 调度时间
    pub timestamp: DateTime<Utc>,
    /// 参与评估的监控项数
    pub monitors_checked: usize,
    /// 到期并执行检测的监控项数
    pub monitors_due: usize,
    /// 成功写入的记录数
    pub recorded: usize,
    /// 写入失败的记录数
    pub record_failures: usize,
    /// 成功送达的告警数
    pub alerts_sent: usize,
}

impl PassSummary {
    fn new(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            monitors_checked: 0,
            monitors_due: 0,
            recorded: 0,
            record_failures: 0,
            alerts_sent: 0,
        }
    }

    fn absorb(&mut self, report: CheckReport) {
        if report.recorded {
            self.recorded += 1;
        } else {
            self.record_failures += 1;
        }
        self.alerts_sent += report.alerts_sent;
    }
}

/// 单个监控项的检测结果
#[derive(Debug, Default)]
struct CheckReport {
    recorded: bool,
    alerts_sent: usize,
}

/// 检测调度器
#[derive(Clone)]
pub struct CheckScheduler {
    store: Arc<dyn MonitorStore>,
    probes: Arc<dyn ProtocolProbe>,
    domains: Arc<DomainChecker>,
    recorder: Arc<Recorder>,
    dispatcher: Arc<AlertDispatcher>,
    settings: EngineSettings,
    semaphore: Arc<Semaphore>,
    snapshot: Option<Arc<MemoryStore>>,
}

impl CheckScheduler {
    /// 创建新的调度器
    ///
    /// # 参数
    /// * `store` - 存储
    /// * `probes` - 协议探测器
    /// * `domains` - 域名检测器
    /// * `recorder` - 结果记录器
    /// * `dispatcher` - 告警分发器
    /// * `settings` - 调度参数
    pub fn new(
        store: Arc<dyn MonitorStore>,
        probes: Arc<dyn ProtocolProbe>,
        domains: Arc<DomainChecker>,
        recorder: Arc<Recorder>,
        dispatcher: Arc<AlertDispatcher>,
        settings: EngineSettings,
    ) -> Self {
        let permits = settings.max_concurrent_checks.max(1);
        Self {
            store,
            probes,
            domains,
            recorder,
            dispatcher,
            settings,
            semaphore: Arc::new(Semaphore::new(permits)),
            snapshot: None,
        }
    }

    /// 每次调度结束后把内存存储写入快照
    pub fn with_snapshot_store(mut self, store: Arc<MemoryStore>) -> Self {
        self.snapshot = Some(store);
        self
    }

    /// 结果记录器
    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// 存储
    pub fn store(&self) -> &Arc<dyn MonitorStore> {
        &self.store
    }

    /// 执行一次协议检测调度
    ///
    /// 单个监控项的失败只影响它自己的记录，不会中断整次调度
    ///
    /// # 参数
    /// * `now` - 本次调度时间，也是本次检测记录的时间
    ///
    /// # 返回
    /// * `Result<PassSummary, StoreError>` - 无法列出监控项时返回错误
    pub async fn run_monitor_pass(&self, now: DateTime<Utc>) -> Result<PassSummary, StoreError> {
        let started = Instant::now();
        let monitors = self.store.list_active_monitors().await?;
        info!("开始检测调度: {} 个启用的监控项", monitors.len());

        let mut summary = PassSummary::new(now);
        summary.monitors_checked = monitors.len();

        let mut tasks = JoinSet::new();
        for monitor in monitors {
            let latest = match self.store.latest_check(&monitor.id).await {
                Ok(latest) => latest,
                Err(e) => {
                    warn!("读取最近检测失败，本次跳过 {}: {}", monitor.name, e);
                    continue;
                }
            };

            let last_checked = latest.as_ref().map(|c| c.checked_at);
            let due = is_due(monitor.interval(), last_checked, now);
            debug!(
                "监控项 {} 间隔 {} 分钟, 上次检测 {:?}, 到期: {}",
                monitor.name, monitor.interval_minutes, last_checked, due
            );
            if !due {
                continue;
            }

            summary.monitors_due += 1;
            let previous = latest.map(|c| c.status);
            let scheduler = self.clone();
            tasks.spawn(async move { scheduler.check_monitor(monitor, previous, now).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => summary.absorb(report),
                Err(e) => {
                    error!("检测任务异常结束: {}", e);
                    summary.record_failures += 1;
                }
            }
        }

        self.persist_snapshot().await;
        info!(
            "检测调度完成: 评估 {} 个, 到期 {} 个, 记录 {} 条, 失败 {} 条, 告警 {} 条, 耗时 {}ms",
            summary.monitors_checked,
            summary.monitors_due,
            summary.recorded,
            summary.record_failures,
            summary.alerts_sent,
            started.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// 执行一次域名检测调度
    ///
    /// 只检测HTTP(S)目标，间隔固定为 `domain_check_interval`
    pub async fn run_domain_pass(&self, now: DateTime<Utc>) -> Result<PassSummary, StoreError> {
        let started = Instant::now();
        let monitors = self.store.list_active_monitors().await?;
        let mut summary = PassSummary::new(now);

        let mut tasks = JoinSet::new();
        for monitor in monitors {
            if !monitor.is_http_target() {
                debug!("非HTTP目标，跳过域名检测: {}", monitor.name);
                continue;
            }
            summary.monitors_checked += 1;

            let last_checked = match self.store.latest_domain_check(&monitor.id).await {
                Ok(latest) => latest.map(|c| c.checked_at),
                Err(e) => {
                    warn!("读取最近域名检测失败，本次跳过 {}: {}", monitor.name, e);
                    continue;
                }
            };

            if !is_due(self.settings.domain_check_interval, last_checked, now) {
                debug!("域名检测未到期: {}", monitor.name);
                continue;
            }

            summary.monitors_due += 1;
            let scheduler = self.clone();
            tasks.spawn(async move { scheduler.check_monitor_domain(monitor, now).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => summary.absorb(report),
                Err(e) => {
                    error!("域名检测任务异常结束: {}", e);
                    summary.record_failures += 1;
                }
            }
        }

        self.persist_snapshot().await;
        info!(
            "域名检测调度完成: 评估 {} 个, 到期 {} 个, 记录 {} 条, 失败 {} 条, 耗时 {}ms",
            summary.monitors_checked,
            summary.monitors_due,
            summary.recorded,
            summary.record_failures,
            started.elapsed().as_millis()
        );
        Ok(summary)
    }

    /// 探测、记录并按需告警
    async fn check_monitor(
        &self,
        monitor: Monitor,
        previous: Option<CheckStatus>,
        checked_at: DateTime<Utc>,
    ) -> CheckReport {
        let outcome = {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("获取并发许可失败: {}", e);
                    return CheckReport::default();
                }
            };
            self.probe_isolated(&monitor).await
        };

        match outcome.status {
            CheckStatus::Up => info!(
                "检测结果: {} up {}ms",
                monitor.name,
                outcome.response_time_ms()
            ),
            status => warn!(
                "检测结果: {} {} {}ms {}",
                monitor.name,
                status,
                outcome.response_time_ms(),
                outcome.error_message.as_deref().unwrap_or("")
            ),
        }

        let check = match self.recorder.record(&monitor.id, outcome, checked_at).await {
            Ok(check) => check,
            Err(e) => {
                // 未写入的检测不告警，否则下次会基于旧的历史重复告警
                error!("写入检测记录失败 {}: {}", monitor.name, e);
                return CheckReport::default();
            }
        };

        let preference = match self.store.alert_preference(&monitor.user_id).await {
            Ok(preference) => preference,
            Err(e) => {
                warn!("读取告警偏好失败 {}: {}", monitor.user_id, e);
                None
            }
        };

        let outcomes = self
            .dispatcher
            .maybe_alert(&monitor, &check, previous, preference.as_ref())
            .await;

        CheckReport {
            recorded: true,
            alerts_sent: outcomes.iter().filter(|o| o.delivered).count(),
        }
    }

    /// 在独立任务中探测，带外层截止时间
    ///
    /// 探测任务panic或超过截止时间都折叠为出错结果
    async fn probe_isolated(&self, monitor: &Monitor) -> ProbeOutcome {
        let target = match Target::parse(&monitor.url) {
            Ok(target) => target,
            Err(e) => return ProbeOutcome::error(Duration::ZERO, e.to_string()),
        };

        let deadline = deadline_for(
            self.probes.timeout_for(target.kind()),
            self.settings.probe_grace,
        );
        let probes = Arc::clone(&self.probes);
        let started = Instant::now();
        let handle = tokio::spawn(async move { probes.probe(&target).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("探测任务异常 {}: {}", monitor.name, e);
                ProbeOutcome::error(started.elapsed(), format!("Probe failed: {}", e))
            }
            Err(_) => {
                abort.abort();
                ProbeOutcome::error(
                    started.elapsed(),
                    format!("Check exceeded deadline of {}ms", deadline.as_millis()),
                )
            }
        }
    }

    /// 检测并记录一个监控项的域名
    async fn check_monitor_domain(&self, monitor: Monitor, checked_at: DateTime<Utc>) -> CheckReport {
        let result = {
            let _permit = match self.semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("获取并发许可失败: {}", e);
                    return CheckReport::default();
                }
            };

            let deadline = deadline_for(
                self.domains.settings().max_timeout(),
                self.settings.probe_grace,
            );
            let domains = Arc::clone(&self.domains);
            let url = monitor.url.clone();
            let handle = tokio::spawn(async move { domains.check_domain(&url).await });
            let abort = handle.abort_handle();

            match tokio::time::timeout(deadline, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => {
                    error!("域名检测任务异常 {}: {}", monitor.name, e);
                    DomainCheckResult::failed(
                        normalize_domain(&monitor.url),
                        &format!("Domain check failed: {}", e),
                    )
                }
                Err(_) => {
                    abort.abort();
                    DomainCheckResult::failed(
                        normalize_domain(&monitor.url),
                        &format!("Domain check exceeded deadline of {}s", deadline.as_secs()),
                    )
                }
            }
        };

        info!(
            "域名检测结果: {} ssl={} dns={} whois={}",
            result.domain,
            result.ssl.valid,
            result.dns.resolved,
            result.whois.error.is_none()
        );

        match self.recorder.record_domain(&monitor.id, result, checked_at).await {
            Ok(_) => CheckReport {
                recorded: true,
                alerts_sent: 0,
            },
            Err(e) => {
                error!("写入域名检测记录失败 {}: {}", monitor.name, e);
                CheckReport::default()
            }
        }
    }

    async fn persist_snapshot(&self) {
        if let Some(store) = &self.snapshot {
            if let Err(e) = store.save_snapshot().await {
                error!("写入快照失败: {}", e);
            }
        }
    }
}
