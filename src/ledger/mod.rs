//! Ledger — where classified expenses end up.

pub mod sheets;

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::expenses::ClassifiedExpense;

pub use sheets::SheetsLedger;

/// One ledger row: date, category, detail, amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// `YYYY-MM-DD`, or empty when the date was unknown.
    pub date: String,
    pub category: String,
    /// Merchant text; empty when absent.
    pub detail: String,
    /// 0.0 when the amount was absent or unparseable.
    pub amount: f64,
}

impl From<&ClassifiedExpense> for LedgerRow {
    fn from(expense: &ClassifiedExpense) -> Self {
        Self {
            date: expense.record.date.clone(),
            category: expense.category.clone(),
            detail: expense.record.detail.clone().unwrap_or_default(),
            amount: parse_amount(expense.record.amount.as_deref()),
        }
    }
}

/// Exact value of an extracted amount; `,` or `.` as decimal separator.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.trim().replace(',', ".")).ok()
}

/// Numeric ledger value of an extracted amount, 0.0 when absent or unparseable.
pub fn parse_amount(raw: Option<&str>) -> f64 {
    raw.and_then(parse_decimal)
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}

/// What the ledger reported after an append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendSummary {
    pub updated_rows: u64,
    pub updated_cells: u64,
}

/// Trait for ledgers — pure I/O, rows arrive already classified and ordered.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    /// Ledger name for logging (e.g. "sheets").
    fn name(&self) -> &str;

    /// Append rows in order.
    async fn append(&self, rows: &[LedgerRow]) -> Result<AppendSummary, LedgerError>;
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::expenses::ExpenseRecord;

    fn classified(amount: Option<&str>, detail: Option<&str>) -> ClassifiedExpense {
        ClassifiedExpense {
            record: ExpenseRecord::new("2025-10-15", amount, detail),
            category: "transporte".into(),
        }
    }

    #[test]
    fn row_from_complete_expense() {
        let row = LedgerRow::from(&classified(Some("1.35"), Some("METRO DE MALAGA")));
        assert_eq!(row.date, "2025-10-15");
        assert_eq!(row.category, "transporte");
        assert_eq!(row.detail, "METRO DE MALAGA");
        assert_eq!(row.amount, 1.35);
    }

    #[test]
    fn row_with_absent_fields() {
        let row = LedgerRow::from(&classified(None, None));
        assert_eq!(row.detail, "");
        assert_eq!(row.amount, 0.0);
    }

    #[test]
    fn decimal_keeps_cents_exact() {
        assert_eq!(parse_decimal("1.35"), Some(dec!(1.35)));
        assert_eq!(parse_decimal(" 15,50 "), Some(dec!(15.50)));
        assert_eq!(parse_decimal("EUR"), None);
    }

    #[test]
    fn comma_decimal_amount() {
        assert_eq!(parse_amount(Some("15,50")), 15.5);
    }

    #[test]
    fn unparseable_amount_is_zero() {
        assert_eq!(parse_amount(Some("1.2.3")), 0.0);
        assert_eq!(parse_amount(Some("")), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }
}
