//! Record builders shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::gateway::{ChangeEvent, ChangeStream, DataGateway, GatewayError, ScopedQuery, Table};
use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, EquipmentType, FreezingRecord,
    FreezingStatus, Product, ProductStatus, Reception, ReceptionItem, Room, TemperatureReading,
};

pub fn account(id: &str) -> AccountId {
    AccountId::parse(id).unwrap()
}

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}

pub fn fridge(user_id: &str, name: &str) -> Equipment {
    Equipment {
        id: new_id("eq"),
        name: name.to_string(),
        equipment_type: EquipmentType::Frigo,
        min_temp: 0.0,
        max_temp: 4.0,
        location: "Cuisine".to_string(),
        user_id: user_id.to_string(),
        created_at: Utc::now(),
    }
}

pub fn reading(
    user_id: &str,
    equipment_id: &str,
    at: DateTime<Utc>,
    within_range: bool,
) -> TemperatureReading {
    TemperatureReading {
        id: new_id("tr"),
        equipment_id: equipment_id.to_string(),
        temperature: if within_range { 3.0 } else { 9.0 },
        timestamp: at,
        user_id: user_id.to_string(),
        is_within_range: within_range,
        notes: None,
    }
}

pub fn product(user_id: &str, status: ProductStatus, expiry_date: NaiveDate) -> Product {
    Product {
        id: new_id("p"),
        name: "Filet de poulet".to_string(),
        lot_number: "LOT-001".to_string(),
        expiry_date,
        supplier: "Metro".to_string(),
        received_date: expiry_date - chrono::Duration::days(10),
        user_id: user_id.to_string(),
        status,
        barcode: None,
    }
}

pub fn reception(user_id: &str, delivered: DateTime<Utc>, is_conform: bool) -> Reception {
    let id = new_id("rec");
    Reception {
        id: id.clone(),
        supplier: "Pomona".to_string(),
        delivery_date: delivered,
        is_conform,
        notes: None,
        user_id: user_id.to_string(),
        reception_items: vec![ReceptionItem {
            id: new_id("item"),
            reception_id: id,
            product_name: "Salade".to_string(),
            quantity: 2.0,
            temperature: Some(4.0),
            expiry_date: None,
            lot_number: None,
            is_conform,
        }],
    }
}

pub fn freezing(user_id: &str, status: FreezingStatus, started: DateTime<Utc>) -> FreezingRecord {
    FreezingRecord {
        id: new_id("fr"),
        product_id: new_id("p"),
        freezing_start_date: started,
        thawed_at: None,
        max_freezing_duration: 90,
        max_thawed_duration: Some(48),
        current_status: status,
        user_id: user_id.to_string(),
        notes: None,
        created_at: started,
    }
}

pub fn room(user_id: &str, name: &str) -> Room {
    Room {
        id: new_id("room"),
        name: name.to_string(),
        user_id: user_id.to_string(),
    }
}

pub fn cleaning_task(
    user_id: &str,
    due_date: NaiveDate,
    completed_at: Option<DateTime<Utc>>,
    is_overdue: bool,
) -> CleaningTask {
    CleaningTask {
        id: new_id("task"),
        room_id: "room-1".to_string(),
        room_name: "Cuisine".to_string(),
        surface_id: "surface-1".to_string(),
        surface_name: "Plan de travail".to_string(),
        description: None,
        is_completed: completed_at.is_some(),
        completed_at,
        user_id: user_id.to_string(),
        due_date,
        is_overdue,
    }
}

pub fn cleaning_record(user_id: &str, at: DateTime<Utc>) -> CleaningRecord {
    CleaningRecord {
        id: new_id("cr"),
        room_id: "room-1".to_string(),
        room_name: "Cuisine".to_string(),
        user_id: user_id.to_string(),
        restaurant_name: Some("Chez Paul".to_string()),
        created_at: at,
    }
}

type Responder = Box<dyn Fn(&ScopedQuery) -> Result<u64, GatewayError> + Send + Sync>;

/// Scriptable gateway: answers counts from a closure, records every query
/// and can hold one account's queries until released.
pub struct StubGateway {
    responder: Responder,
    held: watch::Sender<Option<AccountId>>,
    calls: AtomicUsize,
    queries: Mutex<Vec<ScopedQuery>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl StubGateway {
    pub fn new(
        responder: impl Fn(&ScopedQuery) -> Result<u64, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        let (held, _) = watch::channel(None);
        let (changes, _) = broadcast::channel(16);
        Self {
            responder: Box::new(responder),
            held,
            calls: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
            changes,
        }
    }

    pub fn constant(count: u64) -> Self {
        Self::new(move |_| Ok(count))
    }

    /// Queries for `account` block until [`StubGateway::release`]
    pub fn hold(&self, account: &AccountId) {
        self.held.send_replace(Some(account.clone()));
    }

    pub fn release(&self) {
        self.held.send_replace(None);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<ScopedQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn emit(&self, table: Table, account: &AccountId) {
        let _ = self.changes.send(ChangeEvent {
            table,
            account: account.clone(),
            observed_at: Utc::now(),
        });
    }
}

#[async_trait]
impl DataGateway for StubGateway {
    async fn count(&self, query: &ScopedQuery) -> Result<u64, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());

        let mut held = self.held.subscribe();
        let _ = held
            .wait_for(|account| account.as_ref() != Some(query.account()))
            .await;

        (self.responder)(query)
    }

    fn subscribe(&self, table: Table, account: &AccountId) -> ChangeStream {
        let account = account.clone();
        BroadcastStream::new(self.changes.subscribe())
            .filter_map(move |item| {
                let event = item
                    .ok()
                    .filter(|e| e.table == table && e.account == account)
                    .map(Ok);
                futures::future::ready(event)
            })
            .boxed()
    }
}
