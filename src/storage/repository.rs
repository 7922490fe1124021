//! Repository layer for database CRUD operations
//!
//! Inserts, account-scoped counts and listings over the local store.
//! Timestamps are written with [`format_timestamp`] so text comparison in
//! SQL follows chronological order.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::database::Database;
use super::error::StorageError;
use crate::gateway::{format_date, format_timestamp, FilterValue, ScopedQuery, SCOPE_COLUMN};
use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, EquipmentType, FreezingRecord,
    FreezingStatus, Product, ProductStatus, Reception, ReceptionItem, Room, TemperatureReading,
};

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

fn conversion_error(idx: usize, err: impl Into<BoxedError>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_opt_timestamp(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn get_opt_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_enum<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("unknown value '{}'", raw)))
}

fn sql_value(value: &FilterValue) -> Value {
    match value {
        FilterValue::Bool(b) => Value::Integer(i64::from(*b)),
        other => Value::Text(other.to_text()),
    }
}

fn equipment_from_row(row: &Row) -> rusqlite::Result<Equipment> {
    Ok(Equipment {
        id: row.get(0)?,
        name: row.get(1)?,
        equipment_type: get_enum(row, 2, EquipmentType::from_str)?,
        min_temp: row.get(3)?,
        max_temp: row.get(4)?,
        location: row.get(5)?,
        user_id: row.get(6)?,
        created_at: get_timestamp(row, 7)?,
    })
}

const EQUIPMENT_COLUMNS: &str =
    "id, name, type, min_temp, max_temp, location, user_id, created_at";

const PRODUCT_COLUMNS: &str =
    "id, name, lot_number, expiry_date, supplier, received_date, user_id, status, barcode";

const FREEZING_COLUMNS: &str = "id, product_id, freezing_start_date, thawed_at, max_freezing_duration, \
     max_thawed_duration, current_status, user_id, notes, created_at";

const CLEANING_TASK_COLUMNS: &str = "id, room_id, room_name, surface_id, surface_name, description, \
     is_completed, completed_at, user_id, due_date, is_overdue";

impl Database {
    // ===== Inserts =====

    pub fn insert_equipment(&self, equipment: &Equipment) -> Result<(), StorageError> {
        self.connection().execute(
            &format!("INSERT INTO equipment ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", EQUIPMENT_COLUMNS),
            params![
                equipment.id,
                equipment.name,
                equipment.equipment_type.as_str(),
                equipment.min_temp,
                equipment.max_temp,
                equipment.location,
                equipment.user_id,
                format_timestamp(equipment.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_equipment(&self, id: &str) -> Result<Option<Equipment>, StorageError> {
        let equipment = self
            .connection()
            .query_row(
                &format!("SELECT {} FROM equipment WHERE id = ?1", EQUIPMENT_COLUMNS),
                params![id],
                equipment_from_row,
            )
            .optional()?;
        Ok(equipment)
    }

    pub fn insert_temperature_reading(&self, reading: &TemperatureReading) -> Result<(), StorageError> {
        self.connection().execute(
            "INSERT INTO temperature_readings (id, equipment_id, temperature, timestamp, user_id, is_within_range, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reading.id,
                reading.equipment_id,
                reading.temperature,
                format_timestamp(reading.timestamp),
                reading.user_id,
                reading.is_within_range,
                reading.notes,
            ],
        )?;
        Ok(())
    }

    pub fn insert_product(&self, product: &Product) -> Result<(), StorageError> {
        self.connection().execute(
            &format!("INSERT INTO products ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", PRODUCT_COLUMNS),
            params![
                product.id,
                product.name,
                product.lot_number,
                format_date(product.expiry_date),
                product.supplier,
                format_date(product.received_date),
                product.user_id,
                product.status.as_str(),
                product.barcode,
            ],
        )?;
        Ok(())
    }

    /// Insert a reception and its items atomically
    pub fn insert_reception(&mut self, reception: &Reception) -> Result<(), StorageError> {
        if let Some(item) = reception
            .reception_items
            .iter()
            .find(|item| item.reception_id != reception.id)
        {
            return Err(StorageError::InvalidInput(format!(
                "item {} belongs to reception {}, not {}",
                item.id, item.reception_id, reception.id
            )));
        }

        let tx = self.connection_mut().transaction()?;
        tx.execute(
            "INSERT INTO receptions (id, supplier, delivery_date, is_conform, notes, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                reception.id,
                reception.supplier,
                format_timestamp(reception.delivery_date),
                reception.is_conform,
                reception.notes,
                reception.user_id,
            ],
        )?;
        for item in &reception.reception_items {
            tx.execute(
                "INSERT INTO reception_items (id, reception_id, product_name, quantity, temperature, expiry_date, lot_number, is_conform)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    item.id,
                    item.reception_id,
                    item.product_name,
                    item.quantity,
                    item.temperature,
                    item.expiry_date.map(format_date),
                    item.lot_number,
                    item.is_conform,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn insert_freezing_record(&self, record: &FreezingRecord) -> Result<(), StorageError> {
        self.connection().execute(
            &format!("INSERT INTO freezing_records ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)", FREEZING_COLUMNS),
            params![
                record.id,
                record.product_id,
                format_timestamp(record.freezing_start_date),
                record.thawed_at.map(format_timestamp),
                record.max_freezing_duration,
                record.max_thawed_duration,
                record.current_status.as_str(),
                record.user_id,
                record.notes,
                format_timestamp(record.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn insert_room(&self, room: &Room) -> Result<(), StorageError> {
        self.connection().execute(
            "INSERT INTO rooms (id, name, user_id) VALUES (?1, ?2, ?3)",
            params![room.id, room.name, room.user_id],
        )?;
        Ok(())
    }

    pub fn insert_cleaning_task(&self, task: &CleaningTask) -> Result<(), StorageError> {
        self.connection().execute(
            &format!("INSERT INTO cleaning_tasks ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)", CLEANING_TASK_COLUMNS),
            params![
                task.id,
                task.room_id,
                task.room_name,
                task.surface_id,
                task.surface_name,
                task.description,
                task.is_completed,
                task.completed_at.map(format_timestamp),
                task.user_id,
                format_date(task.due_date),
                task.is_overdue,
            ],
        )?;
        Ok(())
    }

    pub fn insert_cleaning_record(&self, record: &CleaningRecord) -> Result<(), StorageError> {
        self.connection().execute(
            "INSERT INTO cleaning_records (id, room_id, room_name, user_id, restaurant_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.room_id,
                record.room_name,
                record.user_id,
                record.restaurant_name,
                format_timestamp(record.created_at),
            ],
        )?;
        Ok(())
    }

    // ===== Scoped queries =====

    /// Count rows matching a scoped query
    pub fn count(&self, query: &ScopedQuery) -> Result<u64, StorageError> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?1",
            query.table().as_str(),
            SCOPE_COLUMN
        );
        let mut values = vec![Value::Text(query.account().as_str().to_string())];

        for (i, predicate) in query.predicates().iter().enumerate() {
            sql.push_str(&format!(
                " AND {} {} ?{}",
                predicate.column,
                predicate.op.sql(),
                i + 2
            ));
            values.push(sql_value(&predicate.value));
        }

        let count: i64 = self
            .connection()
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    pub fn list_equipment(&self, account: &AccountId) -> Result<Vec<Equipment>, StorageError> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM equipment WHERE user_id = ?1 ORDER BY name ASC",
            EQUIPMENT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![account.as_str()], equipment_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_temperature_readings(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<TemperatureReading>, StorageError> {
        let mut stmt = self.connection().prepare(
            "SELECT id, equipment_id, temperature, timestamp, user_id, is_within_range, notes
             FROM temperature_readings WHERE user_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![account.as_str(), limit as i64], |row| {
            Ok(TemperatureReading {
                id: row.get(0)?,
                equipment_id: row.get(1)?,
                temperature: row.get(2)?,
                timestamp: get_timestamp(row, 3)?,
                user_id: row.get(4)?,
                is_within_range: row.get(5)?,
                notes: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_products(&self, account: &AccountId) -> Result<Vec<Product>, StorageError> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM products WHERE user_id = ?1 ORDER BY expiry_date ASC",
            PRODUCT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![account.as_str()], |row| {
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                lot_number: row.get(2)?,
                expiry_date: get_date(row, 3)?,
                supplier: row.get(4)?,
                received_date: get_date(row, 5)?,
                user_id: row.get(6)?,
                status: get_enum(row, 7, ProductStatus::from_str)?,
                barcode: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_receptions(&self, account: &AccountId) -> Result<Vec<Reception>, StorageError> {
        let conn = self.connection();

        let mut item_stmt = conn.prepare(
            "SELECT ri.id, ri.reception_id, ri.product_name, ri.quantity, ri.temperature,
                    ri.expiry_date, ri.lot_number, ri.is_conform
             FROM reception_items ri
             JOIN receptions r ON r.id = ri.reception_id
             WHERE r.user_id = ?1
             ORDER BY ri.rowid ASC",
        )?;
        let items = item_stmt.query_map(params![account.as_str()], |row| {
            Ok(ReceptionItem {
                id: row.get(0)?,
                reception_id: row.get(1)?,
                product_name: row.get(2)?,
                quantity: row.get(3)?,
                temperature: row.get(4)?,
                expiry_date: get_opt_date(row, 5)?,
                lot_number: row.get(6)?,
                is_conform: row.get(7)?,
            })
        })?;

        let mut items_by_reception: HashMap<String, Vec<ReceptionItem>> = HashMap::new();
        for item in items {
            let item = item?;
            items_by_reception
                .entry(item.reception_id.clone())
                .or_default()
                .push(item);
        }

        let mut stmt = conn.prepare(
            "SELECT id, supplier, delivery_date, is_conform, notes, user_id
             FROM receptions WHERE user_id = ?1
             ORDER BY delivery_date DESC",
        )?;
        let rows = stmt.query_map(params![account.as_str()], |row| {
            Ok(Reception {
                id: row.get(0)?,
                supplier: row.get(1)?,
                delivery_date: get_timestamp(row, 2)?,
                is_conform: row.get(3)?,
                notes: row.get(4)?,
                user_id: row.get(5)?,
                reception_items: Vec::new(),
            })
        })?;

        let mut receptions = Vec::new();
        for reception in rows {
            let mut reception = reception?;
            reception.reception_items = items_by_reception.remove(&reception.id).unwrap_or_default();
            receptions.push(reception);
        }
        Ok(receptions)
    }

    pub fn list_freezing_records(
        &self,
        account: &AccountId,
    ) -> Result<Vec<FreezingRecord>, StorageError> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM freezing_records WHERE user_id = ?1 ORDER BY created_at DESC",
            FREEZING_COLUMNS
        ))?;
        let rows = stmt.query_map(params![account.as_str()], |row| {
            Ok(FreezingRecord {
                id: row.get(0)?,
                product_id: row.get(1)?,
                freezing_start_date: get_timestamp(row, 2)?,
                thawed_at: get_opt_timestamp(row, 3)?,
                max_freezing_duration: row.get(4)?,
                max_thawed_duration: row.get(5)?,
                current_status: get_enum(row, 6, FreezingStatus::from_str)?,
                user_id: row.get(7)?,
                notes: row.get(8)?,
                created_at: get_timestamp(row, 9)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_rooms(&self, account: &AccountId) -> Result<Vec<Room>, StorageError> {
        let mut stmt = self
            .connection()
            .prepare("SELECT id, name, user_id FROM rooms WHERE user_id = ?1 ORDER BY name ASC")?;
        let rows = stmt.query_map(params![account.as_str()], |row| {
            Ok(Room {
                id: row.get(0)?,
                name: row.get(1)?,
                user_id: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_cleaning_tasks(&self, account: &AccountId) -> Result<Vec<CleaningTask>, StorageError> {
        let mut stmt = self.connection().prepare(&format!(
            "SELECT {} FROM cleaning_tasks WHERE user_id = ?1 ORDER BY due_date ASC",
            CLEANING_TASK_COLUMNS
        ))?;
        let rows = stmt.query_map(params![account.as_str()], |row| {
            Ok(CleaningTask {
                id: row.get(0)?,
                room_id: row.get(1)?,
                room_name: row.get(2)?,
                surface_id: row.get(3)?,
                surface_name: row.get(4)?,
                description: row.get(5)?,
                is_completed: row.get(6)?,
                completed_at: get_opt_timestamp(row, 7)?,
                user_id: row.get(8)?,
                due_date: get_date(row, 9)?,
                is_overdue: row.get(10)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn list_cleaning_records(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<CleaningRecord>, StorageError> {
        let mut stmt = self.connection().prepare(
            "SELECT id, room_id, room_name, user_id, restaurant_name, created_at
             FROM cleaning_records WHERE user_id = ?1
             ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![account.as_str(), limit as i64], |row| {
            Ok(CleaningRecord {
                id: row.get(0)?,
                room_id: row.get(1)?,
                room_name: row.get(2)?,
                user_id: row.get(3)?,
                restaurant_name: row.get(4)?,
                created_at: get_timestamp(row, 5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
