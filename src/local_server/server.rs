//! HTTP Server 实现
//!
//! 使用 axum 创建本地 HTTP Server，支持启动和停止。

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use super::config::AppConfig;
use super::handlers::{self, AppState};
use crate::dashboard::MonitorHandle;
use crate::error::AppError;
use crate::gateway::RecordSource;
use crate::session::SessionProvider;

/// Server 控制句柄
///
/// 用于控制 Server 的生命周期
pub struct ServerHandle {
    /// 关闭信号发送器
    shutdown_tx: Option<oneshot::Sender<()>>,
    /// 当前运行的端口
    port: u16,
}

impl ServerHandle {
    /// 获取当前端口
    pub fn port(&self) -> u16 {
        self.port
    }

    /// 关闭 Server
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// 本地 HTTP Server
pub struct LocalServer {
    state: Arc<AppState>,
}

impl LocalServer {
    /// 创建新的 Server 实例
    pub fn new(
        sessions: SessionProvider,
        monitor: MonitorHandle,
        records: Arc<dyn RecordSource>,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                sessions,
                monitor,
                records,
            }),
        }
    }

    /// 构建路由
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/health", get(handlers::health_check))
            .route(
                "/api/session",
                get(handlers::get_session)
                    .post(handlers::sign_in)
                    .delete(handlers::sign_out),
            )
            .route("/api/dashboard/stats", get(handlers::dashboard_stats))
            .route("/api/dashboard/refresh", post(handlers::refresh_dashboard))
            .route("/api/temperature", get(handlers::temperature_page))
            .route("/api/products", get(handlers::products_page))
            .route("/api/receptions", get(handlers::receptions_page))
            .route("/api/freezing", get(handlers::freezing_page))
            .route("/api/cleaning", get(handlers::cleaning_page))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(Arc::clone(&self.state))
    }

    /// 启动 Server
    ///
    /// # Arguments
    /// * `port` - 监听端口 (>= 1024)
    ///
    /// # Returns
    /// ServerHandle 用于控制 Server 生命周期
    pub async fn start(&self, port: u16) -> Result<ServerHandle, AppError> {
        // 验证端口
        AppConfig::validate_port(port).map_err(AppError::Config)?;

        let app = self.router();

        // 绑定地址 (仅本地)
        let addr = SocketAddr::from(([127, 0, 0, 1], port));

        // 创建 TCP listener
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            AppError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to port {}: {}", port, e),
            ))
        })?;

        // 创建关闭信号
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        // 在后台运行 Server
        tokio::spawn(async move {
            let graceful = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });

            if let Err(e) = graceful.await {
                error!(error = %e, "Local API server error");
            }
        });

        info!(port, "Local API listening on 127.0.0.1");

        Ok(ServerHandle {
            shutdown_tx: Some(shutdown_tx),
            port,
        })
    }

    /// 检查端口是否可用
    pub async fn check_port_available(port: u16) -> bool {
        tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port)))
            .await
            .is_ok()
    }
}
