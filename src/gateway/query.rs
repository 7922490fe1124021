//! Account-scoped query descriptions
//!
//! A [`ScopedQuery`] can only be built from an [`AccountId`], so every
//! query handed to a gateway already carries the `user_id` equality filter.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Serialize;

use crate::models::AccountId;

/// Column holding the owning account on every scoped table
pub const SCOPE_COLUMN: &str = "user_id";

/// Record collections exposed by the data service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Equipment,
    TemperatureReadings,
    Products,
    Receptions,
    FreezingRecords,
    Rooms,
    CleaningTasks,
    CleaningRecords,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Equipment => "equipment",
            Table::TemperatureReadings => "temperature_readings",
            Table::Products => "products",
            Table::Receptions => "receptions",
            Table::FreezingRecords => "freezing_records",
            Table::Rooms => "rooms",
            Table::CleaningTasks => "cleaning_tasks",
            Table::CleaningRecords => "cleaning_records",
        }
    }
}

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Gte,
    Lte,
}

impl Op {
    /// PostgREST operator keyword
    pub fn keyword(&self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Gte => "gte",
            Op::Lte => "lte",
        }
    }

    /// SQL operator
    pub fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }
}

/// Typed right-hand side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Bool(bool),
    Text(String),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
}

impl FilterValue {
    /// Canonical text form, shared by the REST encoding and SQLite storage
    ///
    /// Timestamps use fixed millisecond precision with a `Z` suffix so
    /// that lexical order matches chronological order.
    pub fn to_text(&self) -> String {
        match self {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Text(s) => s.clone(),
            FilterValue::Date(d) => format_date(*d),
            FilterValue::Timestamp(ts) => format_timestamp(*ts),
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(value: NaiveDate) -> Self {
        FilterValue::Date(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: &'static str,
    pub op: Op,
    pub value: FilterValue,
}

/// A filter over one table, always bound to one account
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedQuery {
    table: Table,
    account: AccountId,
    predicates: Vec<Predicate>,
}

impl ScopedQuery {
    pub fn new(table: Table, account: &AccountId) -> Self {
        Self {
            table,
            account: account.clone(),
            predicates: Vec::new(),
        }
    }

    pub fn eq(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.with(column, Op::Eq, value.into())
    }

    pub fn gte(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.with(column, Op::Gte, value.into())
    }

    pub fn lte(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.with(column, Op::Lte, value.into())
    }

    fn with(mut self, column: &'static str, op: Op, value: FilterValue) -> Self {
        self.predicates.push(Predicate { column, op, value });
        self
    }

    pub fn table(&self) -> Table {
        self.table
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Predicates beyond the account scope
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// PostgREST query parameters, scope filter first
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.predicates.len() + 1);
        params.push((
            SCOPE_COLUMN.to_string(),
            format!("eq.{}", self.account.as_str()),
        ));
        for p in &self.predicates {
            params.push((
                p.column.to_string(),
                format!("{}.{}", p.op.keyword(), p.value.to_text()),
            ));
        }
        params
    }
}

/// Format a timestamp the way the stores compare it
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}
