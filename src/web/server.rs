//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, AppState};
use crate::config::types::ServerConfig;
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::future::Future;
use tower_http::trace::TraceLayer;
use tracing::info;

/// 创建路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/cron/check-monitors",
            get(handlers::check_monitors).post(handlers::check_monitors),
        )
        .route(
            "/api/cron/check-domains",
            get(handlers::check_domains).post(handlers::check_domains),
        )
        .route("/api/monitors/{id}/summary", get(handlers::monitor_summary))
        .route("/api/monitors/{id}/checks", get(handlers::monitor_checks))
        .route(
            "/api/monitors/{id}/domain-check",
            get(handlers::latest_domain_check),
        )
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Web服务器
pub struct WebServer {
    /// 配置
    config: ServerConfig,
    /// 共享状态
    state: AppState,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// 监听地址
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.bind_address, self.config.port)
    }

    /// 启动Web服务器，直到 `shutdown` 完成
    ///
    /// # 参数
    /// * `shutdown` - 关闭信号
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = self.address();
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("绑定监听地址失败: {address}"))?;

        info!("Web服务器已启动: http://{}", address);
        info!("触发端点: POST http://{}/api/cron/check-monitors", address);

        axum::serve(listener, create_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .context("Web服务器运行失败")?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
