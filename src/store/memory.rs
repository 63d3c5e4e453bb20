//! 内存存储实现
//!
//! 监控项和用户来自配置，重载时整体替换；检测历史按时间排序并限制条数，可选写入JSON快照

use crate::domain::result::DomainCheck;
use crate::error::StoreError;
use crate::health::result::CheckResult;
use crate::store::models::{AlertPreference, Monitor, User};
use crate::store::MonitorStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// 默认每个监控项保留的记录条数
pub const DEFAULT_HISTORY_RETENTION: usize = 1440;

/// 监控项与用户
#[derive(Debug, Default)]
struct Roster {
    monitors: Vec<Monitor>,
    preferences: HashMap<String, AlertPreference>,
}

/// 检测历史，也是快照文件的内容
#[derive(Debug, Default, Serialize, Deserialize)]
struct History {
    #[serde(default)]
    checks: HashMap<String, Vec<CheckResult>>,
    #[serde(default)]
    domain_checks: HashMap<String, Vec<DomainCheck>>,
}

impl History {
    /// 按检测时间排序并裁剪到保留条数
    fn enforce(&mut self, retention: usize) {
        for rows in self.checks.values_mut() {
            rows.sort_by_key(|c| c.checked_at);
            trim_front(rows, retention);
        }
        for rows in self.domain_checks.values_mut() {
            rows.sort_by_key(|c| c.checked_at);
            trim_front(rows, retention);
        }
    }
}

/// 按时间顺序插入，同一时间戳排在已有记录之后
fn insert_ordered<T>(
    rows: &mut Vec<T>,
    row: T,
    checked_at: impl Fn(&T) -> DateTime<Utc>,
    retention: usize,
) {
    let at = checked_at(&row);
    let index = rows.partition_point(|r| checked_at(r) <= at);
    rows.insert(index, row);
    trim_front(rows, retention);
}

/// 丢弃最旧的记录
fn trim_front<T>(rows: &mut Vec<T>, retention: usize) {
    if rows.len() > retention {
        let excess = rows.len() - retention;
        rows.drain(..excess);
    }
}

/// 内存存储
///
/// 每个监控项的历史按`checked_at`升序保存，最多保留`retention`条
#[derive(Debug)]
pub struct MemoryStore {
    roster: RwLock<Roster>,
    history: RwLock<History>,
    snapshot_path: Option<PathBuf>,
    retention: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            roster: RwLock::new(Roster::default()),
            history: RwLock::new(History::default()),
            snapshot_path: None,
            retention: DEFAULT_HISTORY_RETENTION,
        }
    }
}

impl MemoryStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置每个监控项保留的记录条数，已有历史立即裁剪
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self.history.get_mut().enforce(self.retention);
        self
    }

    /// 创建带快照文件的存储，文件存在时加载其中的历史
    ///
    /// # 参数
    /// * `path` - 快照文件路径
    ///
    /// # 返回
    /// * `Result<Self, StoreError>` - 快照存在但无法解析时返回错误
    pub async fn with_snapshot(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let history = if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| snapshot_error(&path, e))?;
            let mut history: History =
                serde_json::from_str(&data).map_err(|e| snapshot_error(&path, e))?;
            // 裁剪留给with_retention
            history.enforce(usize::MAX);
            info!(
                "从快照加载检测历史: {} ({} 个监控项)",
                path.display(),
                history.checks.len()
            );
            history
        } else {
            History::default()
        };

        Ok(Self {
            history: RwLock::new(history),
            snapshot_path: Some(path),
            ..Self::default()
        })
    }

    /// 替换监控项和用户，历史记录保留
    pub async fn replace_roster(&self, monitors: Vec<Monitor>, users: Vec<User>) {
        let mut roster = self.roster.write().await;
        roster.monitors = monitors;
        roster.preferences = users.into_iter().map(|u| (u.id, u.alerts)).collect();
        debug!(
            "存储名单已更新: {} 个监控项, {} 个用户",
            roster.monitors.len(),
            roster.preferences.len()
        );
    }

    /// 快照文件路径
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    /// 把检测历史写入快照文件，未配置快照时不做任何事
    pub async fn save_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let data = {
            let history = self.history.read().await;
            serde_json::to_string(&*history).map_err(|e| snapshot_error(path, e))?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| snapshot_error(path, e))?;
        }

        // 先写临时文件再改名，避免中途失败留下半个文件
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, data)
            .await
            .map_err(|e| snapshot_error(path, e))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| snapshot_error(path, e))?;

        debug!("快照已写入: {}", path.display());
        Ok(())
    }
}

fn snapshot_error(path: &Path, reason: impl std::fmt::Display) -> StoreError {
    StoreError::Snapshot {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn list_active_monitors(&self) -> Result<Vec<Monitor>, StoreError> {
        let roster = self.roster.read().await;
        Ok(roster.monitors.iter().filter(|m| m.active).cloned().collect())
    }

    async fn get_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>, StoreError> {
        let roster = self.roster.read().await;
        Ok(roster.monitors.iter().find(|m| m.id == monitor_id).cloned())
    }

    async fn latest_check(&self, monitor_id: &str) -> Result<Option<CheckResult>, StoreError> {
        let history = self.history.read().await;
        Ok(history
            .checks
            .get(monitor_id)
            .and_then(|checks| checks.last())
            .cloned())
    }

    async fn latest_domain_check(
        &self,
        monitor_id: &str,
    ) -> Result<Option<DomainCheck>, StoreError> {
        let history = self.history.read().await;
        Ok(history
            .domain_checks
            .get(monitor_id)
            .and_then(|checks| checks.last())
            .cloned())
    }

    async fn insert_check(&self, check: CheckResult) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        let rows = history.checks.entry(check.monitor_id.clone()).or_default();
        insert_ordered(rows, check, |c| c.checked_at, self.retention);
        Ok(())
    }

    async fn insert_domain_check(&self, check: DomainCheck) -> Result<(), StoreError> {
        let mut history = self.history.write().await;
        let rows = history
            .domain_checks
            .entry(check.monitor_id.clone())
            .or_default();
        insert_ordered(rows, check, |c| c.checked_at, self.retention);
        Ok(())
    }

    async fn recent_checks(
        &self,
        monitor_id: &str,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StoreError> {
        let history = self.history.read().await;
        Ok(history
            .checks
            .get(monitor_id)
            .map(|checks| checks.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn count_checks(&self, monitor_id: &str) -> Result<usize, StoreError> {
        let history = self.history.read().await;
        Ok(history.checks.get(monitor_id).map_or(0, Vec::len))
    }

    async fn alert_preference(
        &self,
        user_id: &str,
    ) -> Result<Option<AlertPreference>, StoreError> {
        let roster = self.roster.read().await;
        Ok(roster.preferences.get(user_id).cloned())
    }
}
