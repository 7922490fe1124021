//! Unit tests for the stats aggregator

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use super::*;
use crate::gateway::{DataGateway, FilterValue, GatewayError, Op, Table};
use crate::models::{FreezingStatus, ProductStatus};
use crate::storage::LocalStore;
use crate::test_support::*;

fn window() -> StatsWindow {
    StatsWindow::at(Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap())
}

fn seeded_store() -> LocalStore {
    let store = LocalStore::in_memory().unwrap();
    let w = window();

    let eq = fridge("alice", "Frigo");
    store.insert_equipment(&eq).unwrap();
    for i in 0..10 {
        let at = w.start_of_today + Duration::minutes(30 * i);
        store.insert_temperature_reading(&reading("alice", &eq.id, at, i >= 2)).unwrap();
    }
    // Yesterday's alert is outside today's window
    store
        .insert_temperature_reading(&reading("alice", &eq.id, w.start_of_today - Duration::hours(1), false))
        .unwrap();

    store.insert_product(&product("alice", ProductStatus::Active, w.today + Duration::days(3))).unwrap();
    store.insert_product(&product("alice", ProductStatus::Active, w.today + Duration::days(8))).unwrap();
    store.insert_product(&product("alice", ProductStatus::Expired, w.today - Duration::days(2))).unwrap();

    let start = w.now - Duration::days(20);
    store.insert_freezing_record(&freezing("alice", FreezingStatus::Frozen, start)).unwrap();
    store.insert_freezing_record(&freezing("alice", FreezingStatus::Frozen, start)).unwrap();
    store.insert_freezing_record(&freezing("alice", FreezingStatus::Thawed, start)).unwrap();
    store.insert_freezing_record(&freezing("alice", FreezingStatus::Expired, start)).unwrap();

    store
        .insert_cleaning_task(&cleaning_task("alice", w.today, Some(w.now - Duration::hours(1)), false))
        .unwrap();
    store
        .insert_cleaning_task(&cleaning_task("alice", w.today - Duration::days(1), None, true))
        .unwrap();
    store
        .insert_cleaning_task(&cleaning_task("alice", w.today + Duration::days(1), None, false))
        .unwrap();

    // Another account's rows must never be counted
    let other = fridge("bob", "Frigo B");
    store.insert_equipment(&other).unwrap();
    store.insert_temperature_reading(&reading("bob", &other.id, w.now, false)).unwrap();
    store.insert_reception(&reception("bob", w.now, false)).unwrap();
    store.insert_product(&product("bob", ProductStatus::Active, w.today)).unwrap();

    store
}

#[tokio::test]
async fn test_aggregate_against_local_store() {
    let aggregator = StatsAggregator::new(Arc::new(seeded_store()));

    let stats = aggregator.aggregate(&account("alice"), &window()).await.unwrap();

    assert_eq!(stats.temperature_readings_today, 10);
    assert_eq!(stats.temperature_alerts_today, 2);
    assert_eq!(stats.temperature_compliance_rate, 80);
    assert_eq!(stats.equipment_count, 1);
    assert_eq!(stats.active_products, 2);
    assert_eq!(stats.expiring_products_week, 1);
    assert_eq!(stats.expired_products, 1);
    assert_eq!(stats.receptions_this_month, 0);
    assert_eq!(stats.non_conformities_this_month, 0);
    assert_eq!(stats.reception_compliance_rate, 100);
    assert_eq!(stats.currently_frozen, 2);
    assert_eq!(stats.currently_thawed, 1);
    assert_eq!(stats.overdue_tasks, 1);
    assert_eq!(stats.tasks_completed_today, 1);
    assert_eq!(stats.cleaning_completion_rate, 50);
}

#[tokio::test]
async fn test_receptions_this_month() {
    let store = LocalStore::in_memory().unwrap();
    let w = window();
    store.insert_reception(&reception("alice", w.start_of_month, true)).unwrap();
    store.insert_reception(&reception("alice", w.now, true)).unwrap();
    store.insert_reception(&reception("alice", w.now, false)).unwrap();
    store
        .insert_reception(&reception("alice", w.start_of_month - Duration::seconds(1), false))
        .unwrap();

    let stats = StatsAggregator::new(Arc::new(store))
        .aggregate(&account("alice"), &w)
        .await
        .unwrap();

    assert_eq!(stats.receptions_this_month, 3);
    assert_eq!(stats.non_conformities_this_month, 1);
    assert_eq!(stats.reception_compliance_rate, 67);
}

#[tokio::test]
async fn test_aggregate_is_idempotent() {
    let aggregator = StatsAggregator::new(Arc::new(seeded_store()));

    let first = aggregator.aggregate(&account("alice"), &window()).await.unwrap();
    let second = aggregator.aggregate(&account("alice"), &window()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[tokio::test]
async fn test_every_query_is_scoped_to_the_account() {
    let gateway = Arc::new(StubGateway::constant(0));
    let aggregator = StatsAggregator::new(gateway.clone());

    aggregator.aggregate(&account("alice"), &window()).await.unwrap();

    let queries = gateway.queries();
    assert_eq!(queries.len(), Metric::ALL.len());
    assert!(queries.iter().all(|q| q.account() == &account("alice")));
    assert!(queries
        .iter()
        .all(|q| q.to_query_params()[0] == ("user_id".to_string(), "eq.alice".to_string())));
}

#[tokio::test]
async fn test_empty_account_reports_vacuous_compliance() {
    let aggregator = StatsAggregator::new(Arc::new(StubGateway::constant(0)));

    let stats = aggregator.aggregate(&account("alice"), &window()).await.unwrap();

    assert_eq!(stats, DashboardStats {
        temperature_compliance_rate: 100,
        reception_compliance_rate: 100,
        cleaning_completion_rate: 100,
        ..Default::default()
    });
}

#[tokio::test]
async fn test_rejected_query_fails_the_pass() {
    let gateway = StubGateway::new(|q| match q.table() {
        Table::Receptions => Err(GatewayError::Rejected {
            status: 503,
            message: "service unavailable".to_string(),
        }),
        _ => Ok(4),
    });
    let aggregator = StatsAggregator::new(Arc::new(gateway));

    let result = aggregator.aggregate(&account("alice"), &window()).await;

    assert!(matches!(result, Err(GatewayError::Rejected { status: 503, .. })));
}

#[tokio::test]
async fn test_counts_map_to_their_metrics() {
    // 10 readings today, 2 alerts
    let gateway = StubGateway::new(|q| {
        let alerts = q.predicates().iter().any(|p| p.column == "is_within_range");
        Ok(match (q.table(), alerts) {
            (Table::TemperatureReadings, false) => 10,
            (Table::TemperatureReadings, true) => 2,
            _ => 0,
        })
    });
    let gateway: Arc<dyn DataGateway> = Arc::new(gateway);

    let counts = StatsAggregator::new(gateway)
        .collect_counts(&account("alice"), &window())
        .await
        .unwrap();

    assert_eq!(counts.readings_today, 10);
    assert_eq!(counts.alerts_today, 2);
    assert_eq!(counts.equipment, 0);
}

#[test]
fn test_expiring_query_uses_inclusive_date_window() {
    let w = window();
    let query = Metric::ExpiringProductsWeek.query(&account("alice"), &w);

    let predicates: Vec<_> = query
        .predicates()
        .iter()
        .map(|p| (p.column, p.op, p.value.clone()))
        .collect();
    assert_eq!(
        predicates,
        vec![
            ("status", Op::Eq, FilterValue::Text("active".to_string())),
            ("expiry_date", Op::Gte, FilterValue::Date(w.today)),
            ("expiry_date", Op::Lte, FilterValue::Date(w.expiry_horizon)),
        ]
    );
}

#[test]
fn test_tasks_completed_today_filters_on_completion_time() {
    let w = window();
    let query = Metric::TasksCompletedToday.query(&account("alice"), &w);

    assert_eq!(query.table(), Table::CleaningTasks);
    assert!(query
        .predicates()
        .iter()
        .any(|p| p.column == "completed_at" && p.op == Op::Gte
            && p.value == FilterValue::Timestamp(w.start_of_today)));
}
