//! Embedded data gateway
//!
//! [`LocalStore`] serves the gateway traits from a local SQLite
//! database. Every insert publishes a [`ChangeEvent`] so subscribers see
//! new rows without polling.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::database::Database;
use super::error::StorageError;
use crate::gateway::{
    ChangeEvent, ChangeStream, DataGateway, GatewayError, RecordSource, ScopedQuery, Table,
};
use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, FreezingRecord, Product, Reception, Room,
    TemperatureReading,
};

/// Capacity of the change broadcast channel
const CHANGE_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db: Arc::new(Mutex::new(db)),
            changes,
        }
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(Database::new(path)?))
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self::new(Database::new_in_memory()?))
    }

    fn with_db<R>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        let mut db = self.db.lock().map_err(|_| StorageError::LockError)?;
        f(&mut db)
    }

    fn notify(&self, table: Table, user_id: &str) {
        if let Some(account) = AccountId::parse(user_id) {
            // 没有订阅者时 send 返回 Err，可以忽略
            let _ = self.changes.send(ChangeEvent {
                table,
                account,
                observed_at: Utc::now(),
            });
        }
    }

    pub fn insert_equipment(&self, equipment: &Equipment) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_equipment(equipment))?;
        self.notify(Table::Equipment, &equipment.user_id);
        Ok(())
    }

    pub fn insert_temperature_reading(&self, reading: &TemperatureReading) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_temperature_reading(reading))?;
        self.notify(Table::TemperatureReadings, &reading.user_id);
        Ok(())
    }

    /// Record a measurement, deriving `is_within_range` from the equipment band
    pub fn record_temperature(
        &self,
        account: &AccountId,
        equipment_id: &str,
        temperature: f64,
        timestamp: DateTime<Utc>,
        notes: Option<String>,
    ) -> Result<TemperatureReading, StorageError> {
        let equipment = self
            .with_db(|db| db.get_equipment(equipment_id))?
            .filter(|e| e.user_id == account.as_str())
            .ok_or_else(|| StorageError::NotFound(format!("equipment {}", equipment_id)))?;

        let reading = TemperatureReading {
            id: Uuid::new_v4().to_string(),
            equipment_id: equipment.id.clone(),
            temperature,
            timestamp,
            user_id: account.as_str().to_string(),
            is_within_range: equipment.accepts(temperature),
            notes,
        };
        self.insert_temperature_reading(&reading)?;
        Ok(reading)
    }

    pub fn insert_product(&self, product: &Product) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_product(product))?;
        self.notify(Table::Products, &product.user_id);
        Ok(())
    }

    pub fn insert_reception(&self, reception: &Reception) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_reception(reception))?;
        self.notify(Table::Receptions, &reception.user_id);
        Ok(())
    }

    pub fn insert_freezing_record(&self, record: &FreezingRecord) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_freezing_record(record))?;
        self.notify(Table::FreezingRecords, &record.user_id);
        Ok(())
    }

    pub fn insert_room(&self, room: &Room) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_room(room))?;
        self.notify(Table::Rooms, &room.user_id);
        Ok(())
    }

    pub fn insert_cleaning_task(&self, task: &CleaningTask) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_cleaning_task(task))?;
        self.notify(Table::CleaningTasks, &task.user_id);
        Ok(())
    }

    pub fn insert_cleaning_record(&self, record: &CleaningRecord) -> Result<(), StorageError> {
        self.with_db(|db| db.insert_cleaning_record(record))?;
        self.notify(Table::CleaningRecords, &record.user_id);
        Ok(())
    }
}

#[async_trait]
impl DataGateway for LocalStore {
    async fn count(&self, query: &ScopedQuery) -> Result<u64, GatewayError> {
        Ok(self.with_db(|db| db.count(query))?)
    }

    fn subscribe(&self, table: Table, account: &AccountId) -> ChangeStream {
        let account = account.clone();
        let lag_account = account.clone();

        BroadcastStream::new(self.changes.subscribe())
            .filter_map(move |item| {
                let event = match item {
                    Ok(event) if event.table == table && event.account == account => Some(Ok(event)),
                    Ok(_) => None,
                    // 落后时无法知道错过了哪些事件，按一次变更处理
                    Err(_) => Some(Ok(ChangeEvent {
                        table,
                        account: lag_account.clone(),
                        observed_at: Utc::now(),
                    })),
                };
                futures::future::ready(event)
            })
            .boxed()
    }
}

#[async_trait]
impl RecordSource for LocalStore {
    async fn list_equipment(&self, account: &AccountId) -> Result<Vec<Equipment>, GatewayError> {
        Ok(self.with_db(|db| db.list_equipment(account))?)
    }

    async fn list_temperature_readings(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<TemperatureReading>, GatewayError> {
        Ok(self.with_db(|db| db.list_temperature_readings(account, limit))?)
    }

    async fn list_products(&self, account: &AccountId) -> Result<Vec<Product>, GatewayError> {
        Ok(self.with_db(|db| db.list_products(account))?)
    }

    async fn list_receptions(&self, account: &AccountId) -> Result<Vec<Reception>, GatewayError> {
        Ok(self.with_db(|db| db.list_receptions(account))?)
    }

    async fn list_freezing_records(
        &self,
        account: &AccountId,
    ) -> Result<Vec<FreezingRecord>, GatewayError> {
        Ok(self.with_db(|db| db.list_freezing_records(account))?)
    }

    async fn list_rooms(&self, account: &AccountId) -> Result<Vec<Room>, GatewayError> {
        Ok(self.with_db(|db| db.list_rooms(account))?)
    }

    async fn list_cleaning_tasks(
        &self,
        account: &AccountId,
    ) -> Result<Vec<CleaningTask>, GatewayError> {
        Ok(self.with_db(|db| db.list_cleaning_tasks(account))?)
    }

    async fn list_cleaning_records(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<CleaningRecord>, GatewayError> {
        Ok(self.with_db(|db| db.list_cleaning_records(account, limit))?)
    }
}
