//! Expense ingest — bank payment notifications to a categorized spreadsheet.

pub mod channels;
pub mod config;
pub mod error;
pub mod expenses;
pub mod ledger;
pub mod pipeline;
