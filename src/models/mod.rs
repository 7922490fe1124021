//! HACCP domain data models
//!
//! This module defines the record types read from the remote data
//! service and the account identity every query is scoped to.

pub mod account;
pub mod records;

pub use account::*;
pub use records::*;
