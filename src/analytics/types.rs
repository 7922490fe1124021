//! Analytics type definitions
//!
//! Contains the dashboard statistics shape, the time window the metrics are
//! evaluated in, and the per-page summaries derived from record lists.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FreezingRecord, Product};

/// Time boundaries for one aggregation pass
///
/// Derived once from "now" so that every query of the pass shares the same
/// day and month boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsWindow {
    /// The instant the window was derived from
    pub now: DateTime<Utc>,

    /// Local midnight of the current day
    pub start_of_today: DateTime<Utc>,

    /// Local midnight of the first day of the current month
    pub start_of_month: DateTime<Utc>,

    /// Local calendar date
    pub today: NaiveDate,

    /// Last day (inclusive) of the "expiring this week" window
    pub expiry_horizon: NaiveDate,
}

/// Length of the expiring-products window in days
pub const EXPIRY_WINDOW_DAYS: u64 = 7;

impl StatsWindow {
    /// Derives the window for `now` in its own time zone
    pub fn at<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let first_of_month =
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);

        Self {
            now: now.with_timezone(&Utc),
            start_of_today: local_midnight(&tz, today),
            start_of_month: local_midnight(&tz, first_of_month),
            today,
            expiry_horizon: today
                .checked_add_days(Days::new(EXPIRY_WINDOW_DAYS))
                .unwrap_or(NaiveDate::MAX),
        }
    }

    /// Window for the current instant in the local time zone
    pub fn now_local() -> Self {
        Self::at(chrono::Local::now())
    }
}

/// Start of `date` in `tz`, expressed in UTC
///
/// Zones that skip midnight on a DST change start the day at the first
/// representable local time.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    (0..=2)
        .filter_map(|hour| {
            tz.from_local_datetime(&(midnight + chrono::Duration::hours(hour)))
                .earliest()
        })
        .next()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Raw results of the 13 scoped count queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatCounts {
    pub readings_today: u64,
    pub alerts_today: u64,
    pub equipment: u64,
    pub active_products: u64,
    pub expiring_products_week: u64,
    pub expired_products: u64,
    pub receptions_this_month: u64,
    pub non_conformities_this_month: u64,
    pub currently_frozen: u64,
    pub currently_thawed: u64,
    pub overdue_tasks: u64,
    pub tasks_completed_today: u64,
    pub tasks_due_today: u64,
}

/// Compliance statistics shown on the dashboard
///
/// Rates are whole percentages in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub temperature_readings_today: u32,
    pub temperature_alerts_today: u32,
    pub temperature_compliance_rate: u8,

    pub equipment_count: u32,

    pub active_products: u32,
    pub expiring_products_week: u32,
    pub expired_products: u32,

    pub receptions_this_month: u32,
    pub reception_compliance_rate: u8,
    pub non_conformities_this_month: u32,

    pub currently_frozen: u32,
    pub currently_thawed: u32,

    pub cleaning_completion_rate: u8,
    pub overdue_tasks: u32,
    pub tasks_completed_today: u32,
}

/// Shelf-life state of a product relative to today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    /// Past its expiry date or marked expired
    Expired,
    /// Already used
    Consumed,
    /// Expires today
    ExpiresToday,
    /// 1 to 3 days left
    Critical,
    /// 4 to 7 days left
    Warning,
    /// More than a week left
    Fresh,
}

/// Alert raised on a freezing record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezingAlert {
    /// Frozen for at least 90% of the allowed duration
    NearLimit,
    /// Thawed with 12 hours or less left to consume
    ConsumeSoon,
}

/// A product with its derived expiry information
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub days_until_expiry: i64,
    pub expiry_status: ExpiryStatus,
}

/// A freezing record with its derived timers and alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreezingView {
    #[serde(flatten)]
    pub record: FreezingRecord,
    pub days_frozen: i64,
    /// Only set for thawed records
    pub thawed_hours_remaining: Option<i64>,
    pub alert: Option<FreezingAlert>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureSummary {
    pub total: u32,
    pub alerts: u32,
    pub compliance_rate: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub active: u32,
    pub expiring_this_week: u32,
    pub expired: u32,
}

/// Receptions delivered since the start of the month
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceptionSummary {
    pub total: u32,
    pub conform: u32,
    pub non_conform: u32,
    pub compliance_rate: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreezingSummary {
    pub frozen: u32,
    pub thawed: u32,
    pub expired: u32,
}

/// Cleaning progress for tasks due on or before today
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningSummary {
    pub due: u32,
    pub completed: u32,
    pub pending: u32,
    /// Overdue and not completed, regardless of due date
    pub overdue: u32,
    pub completion_rate: u8,
}
