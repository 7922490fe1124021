//! 仪表盘模块
//!
//! Owns the refresh lifecycle of the dashboard statistics and publishes
//! snapshots to the local API.

mod monitor;

pub use monitor::{
    DashboardMonitor, DashboardSnapshot, MonitorConfig, MonitorHandle, DEFAULT_REFRESH_INTERVAL,
    LOAD_ERROR_MESSAGE,
};
