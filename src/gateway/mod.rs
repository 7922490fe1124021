//! 远程数据网关
//!
//! Abstracts the backend data service behind two traits:
//! - [`DataGateway`]: scoped counts and change subscriptions (used by the
//!   stats aggregator)
//! - [`RecordSource`]: scoped record lists (used by the record pages)
//!
//! Implementations: [`RestGateway`] (PostgREST over HTTP) and
//! [`crate::storage::LocalStore`] (embedded SQLite).

mod error;
mod query;
mod rest;

pub use error::GatewayError;
pub use query::{
    format_date, format_timestamp, FilterValue, Op, Predicate, ScopedQuery, Table, SCOPE_COLUMN,
};
pub use rest::{RestGateway, RestGatewayConfig};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;

use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, FreezingRecord, Product, Reception, Room,
    TemperatureReading,
};

/// Notification that rows of a table changed for one account
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub account: AccountId,
    pub observed_at: DateTime<Utc>,
}

/// Stream of change notifications; errors do not end the stream
pub type ChangeStream = BoxStream<'static, Result<ChangeEvent, GatewayError>>;

/// Count and subscription contract of the data service
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// Number of rows matching a scoped filter
    async fn count(&self, query: &ScopedQuery) -> Result<u64, GatewayError>;

    /// Change notifications for one table of one account
    fn subscribe(&self, table: Table, account: &AccountId) -> ChangeStream;
}

/// Scoped record listings
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Equipment ordered by name
    async fn list_equipment(&self, account: &AccountId) -> Result<Vec<Equipment>, GatewayError>;

    /// Most recent readings, newest first
    async fn list_temperature_readings(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<TemperatureReading>, GatewayError>;

    /// Products ordered by expiry date ascending
    async fn list_products(&self, account: &AccountId) -> Result<Vec<Product>, GatewayError>;

    /// Receptions with their items, newest delivery first
    async fn list_receptions(&self, account: &AccountId) -> Result<Vec<Reception>, GatewayError>;

    /// Freezing records, newest first
    async fn list_freezing_records(
        &self,
        account: &AccountId,
    ) -> Result<Vec<FreezingRecord>, GatewayError>;

    /// Rooms ordered by name
    async fn list_rooms(&self, account: &AccountId) -> Result<Vec<Room>, GatewayError>;

    /// Cleaning tasks ordered by due date ascending
    async fn list_cleaning_tasks(
        &self,
        account: &AccountId,
    ) -> Result<Vec<CleaningTask>, GatewayError>;

    /// Most recent cleaning records, newest first
    async fn list_cleaning_records(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<CleaningRecord>, GatewayError>;
}
