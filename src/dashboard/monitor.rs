//! 仪表盘刷新循环
//!
//! A background task keeps the published [`DashboardSnapshot`] current for
//! the signed-in account. It re-aggregates when an account signs in, on a
//! periodic timer, on temperature change notifications and on explicit
//! refresh requests.
//!
//! An account change or sign-out drops any in-flight aggregation, so a
//! result computed for one account is never published under another.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::analytics::{DashboardStats, StatsAggregator, StatsWindow};
use crate::gateway::{ChangeStream, DataGateway, Table};
use crate::models::AccountId;
use crate::session::{Session, SessionProvider};

/// User-facing message for a failed aggregation pass
pub const LOAD_ERROR_MESSAGE: &str = "Failed to load statistics";

/// Default periodic refresh (5 minutes)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period of the refresh timer
    pub refresh_interval: Duration,
    /// Re-aggregate when temperature readings change
    pub realtime_refresh: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            realtime_refresh: true,
        }
    }
}

/// What the presentation layer shows
///
/// `stale` is set when the last pass failed and `stats` still holds the
/// previous successful result.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub account: Option<AccountId>,
    pub stats: Option<DashboardStats>,
    pub loading: bool,
    pub error: Option<String>,
    pub stale: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl DashboardSnapshot {
    fn loading(account: &AccountId) -> Self {
        Self {
            account: Some(account.clone()),
            loading: true,
            ..Default::default()
        }
    }
}

/// Cloneable access to a running monitor
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    snapshot: watch::Receiver<DashboardSnapshot>,
    refresh_tx: mpsc::Sender<()>,
}

impl MonitorHandle {
    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot.clone()
    }

    /// Requests an immediate re-aggregation
    ///
    /// Returns `false` once the monitor has stopped. Requests made while
    /// one is already queued are merged.
    pub fn refresh(&self) -> bool {
        match self.refresh_tx.try_send(()) {
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => true,
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Owner of the refresh task; dropping it stops the task
pub struct DashboardMonitor {
    handle: MonitorHandle,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl DashboardMonitor {
    /// Starts the refresh task on the current runtime
    pub fn spawn(
        gateway: Arc<dyn DataGateway>,
        sessions: SessionProvider,
        config: MonitorConfig,
    ) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot::default());
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = RefreshTask {
            aggregator: StatsAggregator::new(Arc::clone(&gateway)),
            gateway,
            sessions: sessions.subscribe(),
            _session_source: sessions,
            config,
            snapshot_tx,
            refresh_rx,
            shutdown_rx,
        };

        Self {
            handle: MonitorHandle {
                snapshot: snapshot_rx,
                refresh_tx,
            },
            shutdown_tx: Some(shutdown_tx),
            task: Some(tokio::spawn(task.run())),
        }
    }

    pub fn handle(&self) -> MonitorHandle {
        self.handle.clone()
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.handle.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.handle.subscribe()
    }

    pub fn refresh(&self) -> bool {
        self.handle.refresh()
    }

    /// Stops the task and waits for it to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DashboardMonitor {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Why watching one account ended
enum Exit {
    Shutdown,
    SessionChanged,
}

struct RefreshTask {
    aggregator: StatsAggregator,
    gateway: Arc<dyn DataGateway>,
    sessions: watch::Receiver<Option<Session>>,
    // 持有发送端，调用方丢弃 provider 后 `changed()` 仍保持挂起
    _session_source: SessionProvider,
    config: MonitorConfig,
    snapshot_tx: watch::Sender<DashboardSnapshot>,
    refresh_rx: mpsc::Receiver<()>,
    shutdown_rx: oneshot::Receiver<()>,
}

impl RefreshTask {
    async fn run(mut self) {
        info!(interval_secs = self.config.refresh_interval.as_secs(), "Dashboard monitor started");

        loop {
            let account = self
                .sessions
                .borrow_and_update()
                .as_ref()
                .map(|s| s.account.clone());

            let exit = match account {
                Some(account) => self.watch_account(&account).await,
                None => self.wait_for_session().await,
            };
            if let Exit::Shutdown = exit {
                break;
            }
        }

        info!("Dashboard monitor stopped");
    }

    /// Signed out: publish an empty snapshot and idle until a session appears
    async fn wait_for_session(&mut self) -> Exit {
        self.snapshot_tx.send_replace(DashboardSnapshot::default());

        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => return Exit::Shutdown,
                changed = self.sessions.changed() => {
                    return match changed {
                        Ok(()) => Exit::SessionChanged,
                        Err(_) => Exit::Shutdown,
                    };
                }
                // 未登录时忽略刷新请求
                Some(()) = self.refresh_rx.recv() => {}
            }
        }
    }

    async fn watch_account(&mut self, account: &AccountId) -> Exit {
        debug!(account = %account, "Watching account");
        let mut snapshot = DashboardSnapshot::loading(account);
        self.snapshot_tx.send_replace(snapshot.clone());

        // 第一次 tick 立即完成，触发首次加载
        let mut ticker = tokio::time::interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut changes: ChangeStream = if self.config.realtime_refresh {
            self.gateway.subscribe(Table::TemperatureReadings, account)
        } else {
            futures::stream::pending().boxed()
        };

        loop {
            tokio::select! {
                _ = &mut self.shutdown_rx => return Exit::Shutdown,
                changed = self.sessions.changed() => {
                    return match changed {
                        Ok(()) => Exit::SessionChanged,
                        Err(_) => Exit::Shutdown,
                    };
                }
                _ = ticker.tick() => debug!("Refresh timer fired"),
                Some(()) = self.refresh_rx.recv() => debug!("Refresh requested"),
                Some(event) = changes.next() => match event {
                    Ok(event) => debug!(table = event.table.as_str(), "Change notification"),
                    Err(e) => {
                        warn!(error = %e, "Change subscription error");
                        continue;
                    }
                },
            }

            snapshot.loading = true;
            self.snapshot_tx.send_replace(snapshot.clone());

            let window = StatsWindow::now_local();
            let result = tokio::select! {
                _ = &mut self.shutdown_rx => return Exit::Shutdown,
                changed = self.sessions.changed() => {
                    // 账户已变化，丢弃进行中的聚合
                    debug!(account = %account, "Discarding in-flight aggregation");
                    return match changed {
                        Ok(()) => Exit::SessionChanged,
                        Err(_) => Exit::Shutdown,
                    };
                }
                result = self.aggregator.aggregate(account, &window) => result,
            };

            snapshot.loading = false;
            match result {
                Ok(stats) => {
                    snapshot.stats = Some(stats);
                    snapshot.error = None;
                    snapshot.stale = false;
                    snapshot.refreshed_at = Some(Utc::now());
                }
                Err(e) => {
                    warn!(account = %account, error = %e, "Failed to aggregate dashboard stats");
                    snapshot.error = Some(LOAD_ERROR_MESSAGE.to_string());
                    snapshot.stale = snapshot.stats.is_some();
                }
            }
            self.snapshot_tx.send_replace(snapshot.clone());
        }
    }
}
