//! 应用配置模块
//!
//! 从配置目录下的 `settings.yaml` 读取端口、刷新周期和数据源，
//! 环境变量可覆盖部分字段。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::dashboard::MonitorConfig;
use crate::error::AppError;
use crate::gateway::RestGatewayConfig;
use crate::models::AccountId;

/// 默认端口号
pub const DEFAULT_PORT: u16 = 19836;

/// 配置文件名
const CONFIG_FILENAME: &str = "settings.yaml";

/// 应用目录名
pub const APP_DIR_NAME: &str = "haccp-dashboard";

/// 本地数据库文件名
const DATABASE_FILENAME: &str = "haccp.db";

pub const ENV_DATA_URL: &str = "HACCP_DATA_URL";
pub const ENV_DATA_KEY: &str = "HACCP_DATA_KEY";
pub const ENV_API_PORT: &str = "HACCP_API_PORT";
pub const ENV_ACCOUNT: &str = "HACCP_ACCOUNT";

/// 数据源配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSourceConfig {
    /// PostgREST 兼容的远程服务
    Rest {
        url: String,
        api_key: String,
        #[serde(default)]
        access_token: Option<String>,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// 本地 SQLite 数据库，默认位于配置目录
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig::Local { path: None }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_change_poll_secs() -> u64 {
    15
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// 应用配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 本地 API 端口
    #[serde(default = "default_port")]
    pub local_api_port: u16,

    /// 定时刷新周期（秒）
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// 温度记录变化时立即刷新
    #[serde(default = "default_true")]
    pub realtime_refresh: bool,

    /// 远程数据源变化检测周期（秒）
    #[serde(default = "default_change_poll_secs")]
    pub change_poll_secs: u64,

    /// 日志级别，RUST_LOG 优先
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// 启动时登录的账户
    #[serde(default)]
    pub default_account: Option<String>,

    #[serde(default)]
    pub data_source: DataSourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            local_api_port: DEFAULT_PORT,
            refresh_interval_secs: default_refresh_interval_secs(),
            realtime_refresh: true,
            change_poll_secs: default_change_poll_secs(),
            log_level: default_log_level(),
            default_account: None,
            data_source: DataSourceConfig::default(),
        }
    }
}

impl AppConfig {
    /// 默认配置目录 (`<config_dir>/haccp-dashboard`)
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
    }

    /// 从配置目录加载配置
    ///
    /// # Returns
    /// 文件不存在时返回默认配置；文件无法读取或解析时返回错误，
    /// 不会静默回退到本地数据源
    pub fn load(config_dir: &Path) -> Result<Self, AppError> {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)?;
        serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Invalid config file {}: {}", config_path.display(), e))
        })
    }

    /// 应用进程环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// 应用覆盖值
    ///
    /// `HACCP_DATA_URL` 会把数据源切换为远程服务。
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DATA_URL) {
            match &mut self.data_source {
                DataSourceConfig::Rest { url: current, .. } => *current = url,
                DataSourceConfig::Local { .. } => {
                    self.data_source = DataSourceConfig::Rest {
                        url,
                        api_key: String::new(),
                        access_token: None,
                        timeout_secs: default_timeout_secs(),
                    };
                }
            }
        }

        if let Some(key) = lookup(ENV_DATA_KEY) {
            if let DataSourceConfig::Rest { api_key, .. } = &mut self.data_source {
                *api_key = key;
            }
        }

        if let Some(raw) = lookup(ENV_API_PORT) {
            match raw.trim().parse::<u16>() {
                Ok(port) => self.local_api_port = port,
                Err(_) => warn!(value = %raw, "Ignoring invalid {}", ENV_API_PORT),
            }
        }

        if let Some(account) = lookup(ENV_ACCOUNT) {
            self.default_account = Some(account);
        }
    }

    /// 检查配置是否可用于启动
    pub fn validate(&self) -> Result<(), AppError> {
        Self::validate_port(self.local_api_port).map_err(AppError::Config)?;

        if self.refresh_interval_secs == 0 {
            return Err(AppError::Config("refresh_interval_secs must be > 0".to_string()));
        }
        if self.change_poll_secs == 0 {
            return Err(AppError::Config("change_poll_secs must be > 0".to_string()));
        }

        if let DataSourceConfig::Rest { url, api_key, .. } = &self.data_source {
            if url.trim().is_empty() {
                return Err(AppError::Config("data_source.url is required".to_string()));
            }
            if api_key.trim().is_empty() {
                return Err(AppError::Config("data_source.api_key is required".to_string()));
            }
        }

        if let Some(raw) = &self.default_account {
            if AccountId::parse(raw).is_none() {
                return Err(AppError::Config("default_account must not be blank".to_string()));
            }
        }
        Ok(())
    }

    /// 验证端口是否有效
    ///
    /// 端口必须在 1024-65535 范围内
    pub fn validate_port(port: u16) -> Result<(), String> {
        if port < 1024 {
            return Err("Port must be >= 1024 (non-privileged ports)".to_string());
        }
        Ok(())
    }

    pub fn default_account(&self) -> Option<AccountId> {
        self.default_account.as_deref().and_then(AccountId::parse)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs.max(1)),
            realtime_refresh: self.realtime_refresh,
        }
    }

    /// 远程数据源的连接参数，本地数据源返回 None
    pub fn rest_gateway_config(&self) -> Option<RestGatewayConfig> {
        match &self.data_source {
            DataSourceConfig::Rest {
                url,
                api_key,
                access_token,
                timeout_secs,
            } => Some(RestGatewayConfig {
                base_url: url.clone(),
                api_key: api_key.clone(),
                access_token: access_token.clone(),
                timeout: Duration::from_secs(*timeout_secs),
                change_poll_interval: Duration::from_secs(self.change_poll_secs.max(1)),
            }),
            DataSourceConfig::Local { .. } => None,
        }
    }

    /// 本地数据库路径，未配置时位于配置目录
    pub fn local_database_path(&self, config_dir: &Path) -> Option<PathBuf> {
        match &self.data_source {
            DataSourceConfig::Local { path } => Some(
                path.clone()
                    .unwrap_or_else(|| config_dir.join(DATABASE_FILENAME)),
            ),
            DataSourceConfig::Rest { .. } => None,
        }
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) {
        fs::write(dir.join(CONFIG_FILENAME), content).unwrap();
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.local_api_port, DEFAULT_PORT);
        assert_eq!(config.refresh_interval_secs, 300);
        assert!(config.realtime_refresh);
        assert_eq!(config.data_source, DataSourceConfig::Local { path: None });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_nonexistent_config() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_malformed_config_is_an_error() {
        let dir = tempdir().unwrap();
        write_config(dir.path(), "local_api_port: [not a port");

        let err = AppConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("settings.yaml"));
    }

    #[test]
    fn test_load_rest_source_typo_is_an_error() {
        let dir = tempdir().unwrap();
        // kind 拼写错误不应回退为本地数据源
        write_config(
            dir.path(),
            "data_source:\n  kind: rset\n  url: https://demo.supabase.co\n  api_key: anon\n",
        );

        assert!(matches!(AppConfig::load(dir.path()), Err(AppError::Config(_))));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            "refresh_interval_secs: 60\ndata_source:\n  kind: rest\n  url: https://demo.supabase.co\n  api_key: anon\n",
        );

        let config = AppConfig::load(dir.path()).unwrap();

        assert_eq!(config.local_api_port, DEFAULT_PORT);
        assert_eq!(config.refresh_interval_secs, 60);
        let rest = config.rest_gateway_config().unwrap();
        assert_eq!(rest.base_url, "https://demo.supabase.co");
        assert_eq!(rest.timeout, Duration::from_secs(30));
        assert_eq!(rest.change_poll_interval, Duration::from_secs(15));
        assert!(config.local_database_path(dir.path()).is_none());
    }

    #[test]
    fn test_load_full_config() {
        let dir = tempdir().unwrap();
        write_config(
            dir.path(),
            "local_api_port: 12345\ndefault_account: resto-42\ndata_source:\n  kind: local\n  path: /tmp/haccp-test.db\n",
        );

        let loaded = AppConfig::load(dir.path()).unwrap();
        assert_eq!(
            loaded,
            AppConfig {
                local_api_port: 12345,
                default_account: Some("resto-42".to_string()),
                data_source: DataSourceConfig::Local {
                    path: Some(PathBuf::from("/tmp/haccp-test.db")),
                },
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_validate_port() {
        assert!(AppConfig::validate_port(1024).is_ok());
        assert!(AppConfig::validate_port(19836).is_ok());
        assert!(AppConfig::validate_port(65535).is_ok());
        assert!(AppConfig::validate_port(1023).is_err());
        assert!(AppConfig::validate_port(80).is_err());
    }

    #[test]
    fn test_validate_rejects_incomplete_rest_source() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[(ENV_DATA_URL, "https://demo.supabase.co")]));
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        config.apply_overrides(lookup(&[(ENV_DATA_KEY, "anon-key")]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval_and_blank_account() {
        let config = AppConfig {
            refresh_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AppConfig {
            default_account: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.default_account(), None);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[
            (ENV_DATA_URL, "https://demo.supabase.co"),
            (ENV_DATA_KEY, "anon-key"),
            (ENV_API_PORT, "20001"),
            (ENV_ACCOUNT, "resto-1"),
        ]));

        assert_eq!(config.local_api_port, 20001);
        assert_eq!(config.default_account(), Some(AccountId::parse("resto-1").unwrap()));
        assert_eq!(
            config.data_source,
            DataSourceConfig::Rest {
                url: "https://demo.supabase.co".to_string(),
                api_key: "anon-key".to_string(),
                access_token: None,
                timeout_secs: 30,
            }
        );
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_overrides(lookup(&[(ENV_API_PORT, "not-a-port")]));
        assert_eq!(config.local_api_port, DEFAULT_PORT);
    }

    #[test]
    fn test_local_database_path_defaults_to_config_dir() {
        let dir = tempdir().unwrap();
        let config = AppConfig::default();
        assert_eq!(
            config.local_database_path(dir.path()),
            Some(dir.path().join("haccp.db"))
        );
    }

    #[test]
    fn test_monitor_config() {
        let config = AppConfig {
            refresh_interval_secs: 120,
            realtime_refresh: false,
            ..Default::default()
        };
        let monitor = config.monitor_config();
        assert_eq!(monitor.refresh_interval, Duration::from_secs(120));
        assert!(!monitor.realtime_refresh);
    }
}
