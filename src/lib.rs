//! Batch ETL for monthly yellow-taxi trip extracts: read one month's raw
//! CSV, clean it through the record-filter stages, write the cleaned
//! table, repeat per month.

pub mod clean;
pub mod error;
pub mod pipeline;
pub mod stats;
pub mod store;
pub mod table;
