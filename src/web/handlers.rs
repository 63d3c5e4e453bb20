//! Web 路由处理函数
//!
//! 触发端点在单个监控项失败时仍返回200，汇总里记录失败数

use super::{ApiError, AppState, HealthResponse};
use crate::domain::result::DomainCheck;
use crate::health::result::CheckResult;
use crate::health::scheduler::PassSummary;
use crate::recorder::MonitorSummary;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

/// 默认返回的检测记录条数
pub const DEFAULT_CHECKS_LIMIT: usize = 10;
/// 单次最多返回的检测记录条数
pub const MAX_CHECKS_LIMIT: usize = 1000;

/// 检测记录查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ChecksQuery {
    /// 返回条数
    pub limit: Option<usize>,
}

/// 触发一次协议检测调度
pub async fn check_monitors(State(state): State<AppState>) -> Result<Json<PassSummary>, ApiError> {
    info!("收到检测触发请求");
    let summary = state
        .scheduler
        .run_monitor_pass(chrono::Utc::now())
        .await?;
    Ok(Json(summary))
}

/// 触发一次域名检测调度
pub async fn check_domains(State(state): State<AppState>) -> Result<Json<PassSummary>, ApiError> {
    info!("收到域名检测触发请求");
    let summary = state.scheduler.run_domain_pass(chrono::Utc::now()).await?;
    Ok(Json(summary))
}

/// 监控项汇总
pub async fn monitor_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MonitorSummary>, ApiError> {
    ensure_monitor_exists(&state, &id).await?;
    let summary = state.scheduler.recorder().summary(&id).await?;
    Ok(Json(summary))
}

/// 最近的检测记录，按时间倒序
pub async fn monitor_checks(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ChecksQuery>,
) -> Result<Json<Vec<CheckResult>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_CHECKS_LIMIT);
    if limit == 0 || limit > MAX_CHECKS_LIMIT {
        return Err(ApiError::InvalidInput(format!(
            "limit must be between 1 and {MAX_CHECKS_LIMIT}"
        )));
    }

    ensure_monitor_exists(&state, &id).await?;
    let checks = state.scheduler.store().recent_checks(&id, limit).await?;
    Ok(Json(checks))
}

/// 最近一次域名检测
pub async fn latest_domain_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DomainCheck>, ApiError> {
    ensure_monitor_exists(&state, &id).await?;
    state
        .scheduler
        .store()
        .latest_domain_check(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no domain check for monitor {id}")))
}

/// 服务健康检查
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        uptime_seconds: (chrono::Utc::now() - state.start_time).num_seconds(),
    })
}

async fn ensure_monitor_exists(state: &AppState, id: &str) -> Result<(), ApiError> {
    match state.scheduler.store().get_monitor(id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound(format!("monitor {id}"))),
    }
}
