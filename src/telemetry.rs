//! 日志初始化
//!
//! `RUST_LOG` 优先于配置文件中的 `log_level`。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Installs the global fmt subscriber
///
/// Returns `false` when a subscriber was already installed (tests, embedders).
pub fn init_tracing(log_level: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(env_filter)
        .try_init()
        .is_ok()
}
