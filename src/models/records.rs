//! HACCP record data models
//!
//! Rows owned by the remote data service. Field names follow the
//! service's column names so rows deserialize straight from its JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default thawed shelf life in hours when a record carries none
pub const DEFAULT_MAX_THAWED_HOURS: i64 = 48;

/// Cold storage equipment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentType {
    /// Refrigerator
    Frigo,
    /// Freezer
    Congelateur,
}

impl EquipmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EquipmentType::Frigo => "frigo",
            EquipmentType::Congelateur => "congelateur",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "frigo" => Some(EquipmentType::Frigo),
            "congelateur" => Some(EquipmentType::Congelateur),
            _ => None,
        }
    }
}

/// Product lot lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Expired,
    Consumed,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Expired => "expired",
            ProductStatus::Consumed => "consumed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "expired" => Some(ProductStatus::Expired),
            "consumed" => Some(ProductStatus::Consumed),
            _ => None,
        }
    }
}

/// Freeze/thaw cycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezingStatus {
    Frozen,
    Thawed,
    Expired,
}

impl FreezingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FreezingStatus::Frozen => "frozen",
            FreezingStatus::Thawed => "thawed",
            FreezingStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "frozen" => Some(FreezingStatus::Frozen),
            "thawed" => Some(FreezingStatus::Thawed),
            "expired" => Some(FreezingStatus::Expired),
            _ => None,
        }
    }
}

/// Refrigerator or freezer with its acceptable temperature band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub equipment_type: EquipmentType,
    pub min_temp: f64,
    pub max_temp: f64,
    pub location: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Equipment {
    /// Whether a measured temperature lies inside `[min_temp, max_temp]`
    pub fn accepts(&self, temperature: f64) -> bool {
        temperature >= self.min_temp && temperature <= self.max_temp
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub id: String,
    pub equipment_id: String,
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub is_within_range: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub lot_number: String,
    pub expiry_date: NaiveDate,
    pub supplier: String,
    pub received_date: NaiveDate,
    pub user_id: String,
    pub status: ProductStatus,
    #[serde(default)]
    pub barcode: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceptionItem {
    pub id: String,
    pub reception_id: String,
    pub product_name: String,
    pub quantity: f64,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub lot_number: Option<String>,
    pub is_conform: bool,
}

/// Supplier delivery with its inspected line items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reception {
    pub id: String,
    pub supplier: String,
    pub delivery_date: DateTime<Utc>,
    pub is_conform: bool,
    #[serde(default)]
    pub notes: Option<String>,
    pub user_id: String,
    #[serde(default)]
    pub reception_items: Vec<ReceptionItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreezingRecord {
    pub id: String,
    pub product_id: String,
    pub freezing_start_date: DateTime<Utc>,
    #[serde(default)]
    pub thawed_at: Option<DateTime<Utc>>,
    /// Maximum frozen storage, in days
    pub max_freezing_duration: i64,
    /// Maximum shelf life once thawed, in hours
    #[serde(default)]
    pub max_thawed_duration: Option<i64>,
    pub current_status: FreezingStatus,
    pub user_id: String,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningTask {
    pub id: String,
    pub room_id: String,
    pub room_name: String,
    pub surface_id: String,
    pub surface_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub user_id: String,
    pub due_date: NaiveDate,
    pub is_overdue: bool,
}

/// Signed-off cleaning round for one room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningRecord {
    pub id: String,
    pub room_id: String,
    pub room_name: String,
    pub user_id: String,
    #[serde(default)]
    pub restaurant_name: Option<String>,
    pub created_at: DateTime<Utc>,
}
