//! Expense ingestion pipeline.
//!
//! One run:
//! 1. `MailSource::fetch()` — notification emails for a date window
//! 2. `RecordParser::parse()` — per message, may yield nothing
//! 3. `Classifier::classify_batch()` — keyword categories, order kept
//! 4. `LedgerSink::append()` — one append for the whole batch
//!
//! A run that extracts nothing stops after step 2.

pub mod processor;

pub use processor::{ExpensePipeline, RunSummary};
