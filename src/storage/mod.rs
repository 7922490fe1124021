//! Local storage module
//!
//! Provides an SQLite-backed implementation of the data gateway for
//! offline use and tests.

mod database;
mod error;
mod local_store;
mod repository;

pub use database::Database;
pub use error::StorageError;
pub use local_store::LocalStore;
