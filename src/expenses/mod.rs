//! Expense extraction and classification core.
//!
//! Pure, synchronous code:
//! 1. `RecordParser` — date header + body → `ExpenseRecord` (or nothing)
//! 2. `Classifier` — `ExpenseRecord` + `CategoryTable` → `ClassifiedExpense`
//!
//! The only I/O is `CategoryTable::load`, done once per run.

pub mod categories;
pub mod classifier;
pub mod parser;
pub mod types;

pub use categories::{Category, CategoryTable};
pub use classifier::Classifier;
pub use parser::{RecordParser, normalize_date};
pub use types::{
    ClassifiedExpense, ExpenseRecord, NoopObserver, ParseMiss, ParseObserver, TracingObserver,
    UNCATEGORIZED,
};
