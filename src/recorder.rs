//! 检测结果记录器
//!
//! 负责追加检测记录，并为展示层计算当前状态和可用率

use crate::domain::result::{DomainCheck, DomainCheckResult};
use crate::error::StoreError;
use crate::health::result::{CheckResult, CheckStatus, ProbeOutcome};
use crate::store::MonitorStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// 默认可用率统计窗口（最近的检测条数）
pub const DEFAULT_UPTIME_WINDOW: usize = 100;

/// 计算可用率百分比
///
/// 没有任何记录时返回100
pub fn uptime_percent(checks: &[CheckResult]) -> u8 {
    if checks.is_empty() {
        return 100;
    }
    let up = checks.iter().filter(|c| c.status == CheckStatus::Up).count();
    ((up as f64 / checks.len() as f64) * 100.0).round() as u8
}

/// 检测时间最大的记录
pub fn latest_check(checks: &[CheckResult]) -> Option<&CheckResult> {
    checks.iter().max_by_key(|c| c.checked_at)
}

/// 监控项汇总信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSummary {
    /// 监控项ID
    pub monitor_id: String,
    /// 当前状态，从未检测时为空
    pub current_status: Option<CheckStatus>,
    /// 统计窗口内的可用率
    pub uptime_percent: u8,
    /// 最近一次检测
    pub latest_check: Option<CheckResult>,
    /// 检测记录总数
    pub total_checks: usize,
}

/// 检测结果记录器
#[derive(Clone)]
pub struct Recorder {
    store: Arc<dyn MonitorStore>,
    uptime_window: usize,
}

impl Recorder {
    /// 创建新的记录器
    ///
    /// # 参数
    /// * `store` - 存储
    /// * `uptime_window` - 可用率统计使用的最近记录条数
    pub fn new(store: Arc<dyn MonitorStore>, uptime_window: usize) -> Self {
        Self {
            store,
            uptime_window: uptime_window.max(1),
        }
    }

    /// 记录一次探测结果
    pub async fn record(
        &self,
        monitor_id: &str,
        outcome: ProbeOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<CheckResult, StoreError> {
        let check = CheckResult::from_outcome(monitor_id, outcome, checked_at);
        self.store.insert_check(check.clone()).await?;
        debug!(
            "检测记录已写入: {} {} {}ms",
            monitor_id, check.status, check.response_time_ms
        );
        Ok(check)
    }

    /// 记录一次域名检测结果
    pub async fn record_domain(
        &self,
        monitor_id: &str,
        result: DomainCheckResult,
        checked_at: DateTime<Utc>,
    ) -> Result<DomainCheck, StoreError> {
        let record = DomainCheck::new(monitor_id, result, checked_at);
        self.store.insert_domain_check(record.clone()).await?;
        debug!("域名检测记录已写入: {} {}", monitor_id, record.result.domain);
        Ok(record)
    }

    /// 监控项汇总
    pub async fn summary(&self, monitor_id: &str) -> Result<MonitorSummary, StoreError> {
        let window = self
            .store
            .recent_checks(monitor_id, self.uptime_window)
            .await?;
        let total_checks = self.store.count_checks(monitor_id).await?;
        let latest = latest_check(&window).cloned();

        Ok(MonitorSummary {
            monitor_id: monitor_id.to_string(),
            current_status: latest.as_ref().map(|c| c.status),
            uptime_percent: uptime_percent(&window),
            latest_check: latest,
            total_checks,
        })
    }
}
