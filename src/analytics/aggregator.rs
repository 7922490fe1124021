//! Dashboard statistics aggregation
//!
//! Issues the 13 scoped count queries concurrently, waits for all of them
//! and reduces the counts with [`calculate_dashboard_stats`]. The first
//! rejected query fails the whole pass; no partial stats are produced.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};

use crate::gateway::{DataGateway, GatewayError, ScopedQuery, Table};
use crate::models::{AccountId, FreezingStatus, ProductStatus};

use super::calculator::calculate_dashboard_stats;
use super::{DashboardStats, StatCounts, StatsWindow};

/// One count query of an aggregation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    ReadingsToday,
    AlertsToday,
    Equipment,
    ActiveProducts,
    ExpiringProductsWeek,
    ExpiredProducts,
    ReceptionsThisMonth,
    NonConformitiesThisMonth,
    CurrentlyFrozen,
    CurrentlyThawed,
    OverdueTasks,
    TasksCompletedToday,
    TasksDueToday,
}

impl Metric {
    pub const ALL: [Metric; 13] = [
        Metric::ReadingsToday,
        Metric::AlertsToday,
        Metric::Equipment,
        Metric::ActiveProducts,
        Metric::ExpiringProductsWeek,
        Metric::ExpiredProducts,
        Metric::ReceptionsThisMonth,
        Metric::NonConformitiesThisMonth,
        Metric::CurrentlyFrozen,
        Metric::CurrentlyThawed,
        Metric::OverdueTasks,
        Metric::TasksCompletedToday,
        Metric::TasksDueToday,
    ];

    /// Scoped query counting this metric for `account` within `window`
    pub fn query(&self, account: &AccountId, window: &StatsWindow) -> ScopedQuery {
        match self {
            Metric::ReadingsToday => ScopedQuery::new(Table::TemperatureReadings, account)
                .gte("timestamp", window.start_of_today),
            Metric::AlertsToday => ScopedQuery::new(Table::TemperatureReadings, account)
                .gte("timestamp", window.start_of_today)
                .eq("is_within_range", false),
            Metric::Equipment => ScopedQuery::new(Table::Equipment, account),
            Metric::ActiveProducts => ScopedQuery::new(Table::Products, account)
                .eq("status", ProductStatus::Active.as_str()),
            Metric::ExpiringProductsWeek => ScopedQuery::new(Table::Products, account)
                .eq("status", ProductStatus::Active.as_str())
                .gte("expiry_date", window.today)
                .lte("expiry_date", window.expiry_horizon),
            Metric::ExpiredProducts => ScopedQuery::new(Table::Products, account)
                .eq("status", ProductStatus::Expired.as_str()),
            Metric::ReceptionsThisMonth => ScopedQuery::new(Table::Receptions, account)
                .gte("delivery_date", window.start_of_month),
            Metric::NonConformitiesThisMonth => ScopedQuery::new(Table::Receptions, account)
                .gte("delivery_date", window.start_of_month)
                .eq("is_conform", false),
            Metric::CurrentlyFrozen => ScopedQuery::new(Table::FreezingRecords, account)
                .eq("current_status", FreezingStatus::Frozen.as_str()),
            Metric::CurrentlyThawed => ScopedQuery::new(Table::FreezingRecords, account)
                .eq("current_status", FreezingStatus::Thawed.as_str()),
            Metric::OverdueTasks => ScopedQuery::new(Table::CleaningTasks, account)
                .eq("is_overdue", true)
                .eq("is_completed", false),
            Metric::TasksCompletedToday => ScopedQuery::new(Table::CleaningTasks, account)
                .eq("is_completed", true)
                .gte("completed_at", window.start_of_today),
            Metric::TasksDueToday => ScopedQuery::new(Table::CleaningTasks, account)
                .lte("due_date", window.today),
        }
    }

    fn record(&self, counts: &mut StatCounts, value: u64) {
        let slot = match self {
            Metric::ReadingsToday => &mut counts.readings_today,
            Metric::AlertsToday => &mut counts.alerts_today,
            Metric::Equipment => &mut counts.equipment,
            Metric::ActiveProducts => &mut counts.active_products,
            Metric::ExpiringProductsWeek => &mut counts.expiring_products_week,
            Metric::ExpiredProducts => &mut counts.expired_products,
            Metric::ReceptionsThisMonth => &mut counts.receptions_this_month,
            Metric::NonConformitiesThisMonth => &mut counts.non_conformities_this_month,
            Metric::CurrentlyFrozen => &mut counts.currently_frozen,
            Metric::CurrentlyThawed => &mut counts.currently_thawed,
            Metric::OverdueTasks => &mut counts.overdue_tasks,
            Metric::TasksCompletedToday => &mut counts.tasks_completed_today,
            Metric::TasksDueToday => &mut counts.tasks_due_today,
        };
        *slot = value;
    }
}

/// Computes [`DashboardStats`] against a data gateway
#[derive(Clone)]
pub struct StatsAggregator {
    gateway: Arc<dyn DataGateway>,
}

impl StatsAggregator {
    pub fn new(gateway: Arc<dyn DataGateway>) -> Self {
        Self { gateway }
    }

    /// Runs all count queries for `account` and returns the raw counts
    pub async fn collect_counts(
        &self,
        account: &AccountId,
        window: &StatsWindow,
    ) -> Result<StatCounts, GatewayError> {
        let queries = Metric::ALL.into_iter().map(|metric| {
            let query = metric.query(account, window);
            let gateway = Arc::clone(&self.gateway);
            async move {
                let count = gateway.count(&query).await.map_err(|e| {
                    warn!(metric = ?metric, table = query.table().as_str(), error = %e, "Count query failed");
                    e
                })?;
                Ok::<_, GatewayError>((metric, count))
            }
        });

        let results = try_join_all(queries).await?;

        let mut counts = StatCounts::default();
        for (metric, value) in results {
            metric.record(&mut counts, value);
        }
        Ok(counts)
    }

    /// Aggregates the dashboard statistics for one account
    pub async fn aggregate(
        &self,
        account: &AccountId,
        window: &StatsWindow,
    ) -> Result<DashboardStats, GatewayError> {
        let counts = self.collect_counts(account, window).await?;
        let stats = calculate_dashboard_stats(&counts);
        debug!(
            account = %account,
            readings_today = stats.temperature_readings_today,
            temperature_rate = stats.temperature_compliance_rate,
            reception_rate = stats.reception_compliance_rate,
            cleaning_rate = stats.cleaning_completion_rate,
            "Dashboard stats aggregated"
        );
        Ok(stats)
    }
}
