//! Analytics calculation logic
//!
//! Rate arithmetic for the dashboard plus the derived views used by the
//! record pages. Everything here is pure: callers supply the counts or
//! records and the time window.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::models::{
    CleaningTask, FreezingRecord, FreezingStatus, Product, ProductStatus, Reception,
    TemperatureReading, DEFAULT_MAX_THAWED_HOURS,
};

use super::{
    CleaningSummary, DashboardStats, ExpiryStatus, FreezingAlert, FreezingSummary, FreezingView,
    ProductSummary, ProductView, ReceptionSummary, StatCounts, StatsWindow, TemperatureSummary,
};

/// Days left at or under which a product is critical
const CRITICAL_DAYS: i64 = 3;
/// Days left at or under which a product needs attention
const WARNING_DAYS: i64 = 7;
/// Thawed hours left at or under which the product must be used
const CONSUME_SOON_HOURS: i64 = 12;

/// Whole percentage of `numerator / denominator`, rounded half up
///
/// Returns 100 when the denominator is 0 (nothing to comply with). The
/// numerator is capped at the denominator, so the result is always in
/// `0..=100`.
pub fn rounded_percentage(numerator: u64, denominator: u64) -> u8 {
    if denominator == 0 {
        return 100;
    }
    let n = u128::from(numerator.min(denominator));
    let d = u128::from(denominator);
    // round(100n/d) = floor((200n + d) / 2d)
    ((200 * n + d) / (2 * d)) as u8
}

/// Share of `total` observations that did not fail
pub fn compliance_rate(total: u64, failures: u64) -> u8 {
    rounded_percentage(total.saturating_sub(failures), total)
}

/// Share of `total` items that are done
pub fn completion_rate(done: u64, total: u64) -> u8 {
    rounded_percentage(done, total)
}

fn clamp_count(count: u64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Reduces the raw query counts to the published statistics
pub fn calculate_dashboard_stats(counts: &StatCounts) -> DashboardStats {
    DashboardStats {
        temperature_readings_today: clamp_count(counts.readings_today),
        temperature_alerts_today: clamp_count(counts.alerts_today),
        temperature_compliance_rate: compliance_rate(counts.readings_today, counts.alerts_today),

        equipment_count: clamp_count(counts.equipment),

        active_products: clamp_count(counts.active_products),
        expiring_products_week: clamp_count(counts.expiring_products_week),
        expired_products: clamp_count(counts.expired_products),

        receptions_this_month: clamp_count(counts.receptions_this_month),
        reception_compliance_rate: compliance_rate(
            counts.receptions_this_month,
            counts.non_conformities_this_month,
        ),
        non_conformities_this_month: clamp_count(counts.non_conformities_this_month),

        currently_frozen: clamp_count(counts.currently_frozen),
        currently_thawed: clamp_count(counts.currently_thawed),

        cleaning_completion_rate: completion_rate(
            counts.tasks_completed_today,
            counts.tasks_due_today,
        ),
        overdue_tasks: clamp_count(counts.overdue_tasks),
        tasks_completed_today: clamp_count(counts.tasks_completed_today),
    }
}

// ===== Products =====

/// Calendar days from `today` to `expiry_date` (negative once past)
pub fn days_until_expiry(expiry_date: NaiveDate, today: NaiveDate) -> i64 {
    (expiry_date - today).num_days()
}

pub fn classify_expiry(product: &Product, today: NaiveDate) -> ExpiryStatus {
    let days = days_until_expiry(product.expiry_date, today);
    match product.status {
        ProductStatus::Expired => ExpiryStatus::Expired,
        ProductStatus::Consumed => ExpiryStatus::Consumed,
        ProductStatus::Active if days < 0 => ExpiryStatus::Expired,
        ProductStatus::Active if days == 0 => ExpiryStatus::ExpiresToday,
        ProductStatus::Active if days <= CRITICAL_DAYS => ExpiryStatus::Critical,
        ProductStatus::Active if days <= WARNING_DAYS => ExpiryStatus::Warning,
        ProductStatus::Active => ExpiryStatus::Fresh,
    }
}

/// Whether an active product falls in the inclusive expiring window
pub fn is_expiring_within_window(product: &Product, window: &StatsWindow) -> bool {
    product.status == ProductStatus::Active
        && product.expiry_date >= window.today
        && product.expiry_date <= window.expiry_horizon
}

pub fn product_view(product: Product, today: NaiveDate) -> ProductView {
    ProductView {
        days_until_expiry: days_until_expiry(product.expiry_date, today),
        expiry_status: classify_expiry(&product, today),
        product,
    }
}

pub fn summarize_products(products: &[Product], window: &StatsWindow) -> ProductSummary {
    let mut summary = ProductSummary::default();
    for product in products {
        match product.status {
            ProductStatus::Active => summary.active += 1,
            ProductStatus::Expired => summary.expired += 1,
            ProductStatus::Consumed => {}
        }
        if is_expiring_within_window(product, window) {
            summary.expiring_this_week += 1;
        }
    }
    summary
}

// ===== Freezing =====

/// Whole days since freezing started (0 for a start in the future)
pub fn days_frozen(record: &FreezingRecord, now: DateTime<Utc>) -> i64 {
    (now - record.freezing_start_date).num_days().max(0)
}

/// Whole hours left to consume a thawed product, `None` if not thawed
pub fn thawed_hours_remaining(record: &FreezingRecord, now: DateTime<Utc>) -> Option<i64> {
    let thawed_at = record.thawed_at?;
    let hours = record.max_thawed_duration.unwrap_or(DEFAULT_MAX_THAWED_HOURS);
    // 超出时间范围的时长按边界处理
    let deadline = TimeDelta::try_hours(hours)
        .and_then(|allowed| thawed_at.checked_add_signed(allowed))
        .unwrap_or(if hours < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
    Some((deadline - now).num_hours().max(0))
}

pub fn classify_freezing(record: &FreezingRecord, now: DateTime<Utc>) -> Option<FreezingAlert> {
    match record.current_status {
        FreezingStatus::Frozen => {
            // 90% 阈值用整数比较，避免浮点误差
            let near_limit = days_frozen(record, now).saturating_mul(10)
                >= record.max_freezing_duration.saturating_mul(9);
            near_limit.then_some(FreezingAlert::NearLimit)
        }
        FreezingStatus::Thawed => thawed_hours_remaining(record, now)
            .filter(|hours| *hours <= CONSUME_SOON_HOURS)
            .map(|_| FreezingAlert::ConsumeSoon),
        FreezingStatus::Expired => None,
    }
}

pub fn freezing_view(record: FreezingRecord, now: DateTime<Utc>) -> FreezingView {
    let thawed_hours_remaining = match record.current_status {
        FreezingStatus::Thawed => thawed_hours_remaining(&record, now),
        _ => None,
    };
    FreezingView {
        days_frozen: days_frozen(&record, now),
        thawed_hours_remaining,
        alert: classify_freezing(&record, now),
        record,
    }
}

pub fn summarize_freezing(records: &[FreezingRecord]) -> FreezingSummary {
    let mut summary = FreezingSummary::default();
    for record in records {
        match record.current_status {
            FreezingStatus::Frozen => summary.frozen += 1,
            FreezingStatus::Thawed => summary.thawed += 1,
            FreezingStatus::Expired => summary.expired += 1,
        }
    }
    summary
}

// ===== Temperature / receptions / cleaning =====

pub fn summarize_temperature(readings: &[TemperatureReading]) -> TemperatureSummary {
    let total = readings.len() as u64;
    let alerts = readings.iter().filter(|r| !r.is_within_range).count() as u64;
    TemperatureSummary {
        total: clamp_count(total),
        alerts: clamp_count(alerts),
        compliance_rate: compliance_rate(total, alerts),
    }
}

/// Summarizes receptions delivered since the start of the window's month
pub fn summarize_receptions(receptions: &[Reception], window: &StatsWindow) -> ReceptionSummary {
    let this_month: Vec<&Reception> = receptions
        .iter()
        .filter(|r| r.delivery_date >= window.start_of_month)
        .collect();
    let total = this_month.len() as u64;
    let non_conform = this_month.iter().filter(|r| !r.is_conform).count() as u64;

    ReceptionSummary {
        total: clamp_count(total),
        conform: clamp_count(total - non_conform),
        non_conform: clamp_count(non_conform),
        compliance_rate: compliance_rate(total, non_conform),
    }
}

pub fn summarize_cleaning(tasks: &[CleaningTask], window: &StatsWindow) -> CleaningSummary {
    let mut summary = CleaningSummary::default();
    for task in tasks {
        if task.is_overdue && !task.is_completed {
            summary.overdue += 1;
        }
        if task.due_date > window.today {
            continue;
        }
        summary.due += 1;
        if task.is_completed {
            summary.completed += 1;
        } else if !task.is_overdue {
            summary.pending += 1;
        }
    }
    summary.completion_rate = completion_rate(summary.completed.into(), summary.due.into());
    summary
}
