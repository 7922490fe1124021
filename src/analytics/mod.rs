//! Analytics module for compliance statistics
//!
//! Computes the dashboard statistics from scoped count queries and the
//! derived views shown on the record pages.
//!
//! ## Architecture
//!
//! - **Aggregator**: fans out the count queries and waits for all of them
//! - **Calculator**: pure rate arithmetic and record classification
//! - **Window**: day, month and week boundaries fixed once per pass

mod types;


pub use types::*;

/// Calculator module for rates and derived views
pub mod calculator;


mod aggregator;

#[cfg(test)]
mod aggregator_tests;

pub use aggregator::{Metric, StatsAggregator};
