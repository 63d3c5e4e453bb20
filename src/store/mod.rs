//! 持久化存储模块
//!
//! 定义检测引擎读写的存储接口，并提供内存实现

pub mod memory;
pub mod models;

use crate::domain::result::DomainCheck;
use crate::error::StoreError;
use crate::health::result::CheckResult;
use async_trait::async_trait;

// 重新导出主要类型
pub use memory::MemoryStore;
pub use models::{AlertPreference, Monitor, User};

/// 存储接口
///
/// 历史记录只追加，不更新也不删除
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// 列出所有启用的监控项
    async fn list_active_monitors(&self) -> Result<Vec<Monitor>, StoreError>;

    /// 按ID获取监控项（包括未启用的）
    async fn get_monitor(&self, monitor_id: &str) -> Result<Option<Monitor>, StoreError>;

    /// 最近一次检测记录（检测时间最大者）
    async fn latest_check(&self, monitor_id: &str) -> Result<Option<CheckResult>, StoreError>;

    /// 最近一次域名检测记录
    async fn latest_domain_check(&self, monitor_id: &str)
        -> Result<Option<DomainCheck>, StoreError>;

    /// 追加一条检测记录
    async fn insert_check(&self, check: CheckResult) -> Result<(), StoreError>;

    /// 追加一条域名检测记录
    async fn insert_domain_check(&self, check: DomainCheck) -> Result<(), StoreError>;

    /// 最近的检测记录，按时间倒序，最多 `limit` 条
    async fn recent_checks(
        &self,
        monitor_id: &str,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StoreError>;

    /// 监控项的检测记录总数
    async fn count_checks(&self, monitor_id: &str) -> Result<usize, StoreError>;

    /// 用户的告警偏好
    async fn alert_preference(&self, user_id: &str)
        -> Result<Option<AlertPreference>, StoreError>;
}
