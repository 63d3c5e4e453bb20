//! HTTP接口模块
//!
//! 提供外部定时器调用的触发端点和只读查询端点

use crate::health::scheduler::CheckScheduler;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub mod handlers;
pub mod server;

pub use server::{create_router, WebServer};

/// 处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    /// 检测调度器，也提供存储和记录器
    pub scheduler: Arc<CheckScheduler>,
    /// 启动时间
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    /// 创建新的状态
    pub fn new(scheduler: Arc<CheckScheduler>) -> Self {
        Self {
            scheduler,
            start_time: chrono::Utc::now(),
        }
    }
}

/// 接口错误
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Store error: {0}")]
    Store(#[from] crate::error::StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// 服务状态
    pub status: &'static str,
    /// 版本信息
    pub version: &'static str,
    /// 运行时间
    pub uptime_seconds: i64,
}
