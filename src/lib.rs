// HACCP Dashboard Library
// Aggregates food-safety compliance statistics and serves them over a local API

pub mod analytics;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod local_server;
pub mod models;
pub mod session;
pub mod storage;
pub mod telemetry;

#[cfg(test)]
mod test_support;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use dashboard::DashboardMonitor;
use error::AppError;
use gateway::{DataGateway, RecordSource, RestGateway};
use local_server::{AppConfig, LocalServer};
use session::SessionProvider;
use storage::LocalStore;

/// Opens the configured data source as both count gateway and record source
fn open_data_source(
    config: &AppConfig,
    config_dir: &std::path::Path,
) -> Result<(Arc<dyn DataGateway>, Arc<dyn RecordSource>), AppError> {
    if let Some(rest) = config.rest_gateway_config() {
        info!(url = %rest.base_url, "Using remote data service");
        let gateway = Arc::new(RestGateway::new(rest)?);
        let counts: Arc<dyn DataGateway> = gateway.clone();
        let records: Arc<dyn RecordSource> = gateway;
        return Ok((counts, records));
    }

    let path = config
        .local_database_path(config_dir)
        .ok_or_else(|| AppError::Config("No data source configured".to_string()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    info!(path = %path.display(), "Using local database");
    let store = Arc::new(LocalStore::open(&path)?);
    let counts: Arc<dyn DataGateway> = store.clone();
    let records: Arc<dyn RecordSource> = store;
    Ok((counts, records))
}

/// Runs the dashboard service until Ctrl-C
pub async fn run() -> Result<(), AppError> {
    let config_dir = AppConfig::default_dir().unwrap_or_else(|| PathBuf::from("."));
    // 配置文件错误由 main 输出到 stderr
    let mut config = AppConfig::load(&config_dir)?;

    telemetry::init_tracing(&config.log_level);
    config.apply_env_overrides();
    config.validate()?;
    info!(config_dir = %config_dir.display(), "Starting HACCP dashboard");

    let (gateway, records) = open_data_source(&config, &config_dir)?;

    let sessions = match config.default_account() {
        Some(account) => SessionProvider::signed_in(account),
        None => SessionProvider::new(),
    };

    let monitor = DashboardMonitor::spawn(gateway, sessions.clone(), config.monitor_config());
    let server = LocalServer::new(sessions, monitor.handle(), records);
    let handle = server.start(config.local_api_port).await?;

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }

    info!("Shutting down");
    handle.shutdown();
    monitor.shutdown().await;
    Ok(())
}
