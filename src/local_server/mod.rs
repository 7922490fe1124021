//! 本地 HTTP Server 模块
//!
//! 提供本地 API 服务，向展示层提供仪表盘快照和记录列表。
//! 监听 127.0.0.1:{port}，仅接受本地请求。

mod config;
mod handlers;
mod server;

pub use config::{AppConfig, DataSourceConfig, APP_DIR_NAME, DEFAULT_PORT};
pub use handlers::AppState;
pub use server::{LocalServer, ServerHandle};

#[cfg(test)]
mod tests;
