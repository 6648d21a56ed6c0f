//! Shared types for expense extraction and classification.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Category assigned when no keyword matches.
pub const UNCATEGORIZED: &str = "otros";

// ── Records ─────────────────────────────────────────────────────────

/// Structured expense extracted from one notification email.
///
/// `amount` and `detail` are `None` when their pattern did not match.
/// `date` follows the ledger convention instead: an empty string means
/// the header could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// `YYYY-MM-DD`, or empty when unknown.
    pub date: String,
    /// Decimal string exactly as written in the email (e.g. `"1.20"`).
    pub amount: Option<String>,
    /// Merchant text, trimmed.
    pub detail: Option<String>,
}

impl ExpenseRecord {
    pub fn new(
        date: impl Into<String>,
        amount: Option<impl Into<String>>,
        detail: Option<impl Into<String>>,
    ) -> Self {
        Self {
            date: date.into(),
            amount: amount.map(Into::into),
            detail: detail.map(Into::into),
        }
    }
}

/// An expense record with its assigned category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedExpense {
    #[serde(flatten)]
    pub record: ExpenseRecord,
    /// Never empty; [`UNCATEGORIZED`] when nothing matched.
    pub category: String,
}

// ── Parse observer ──────────────────────────────────────────────────

/// A recoverable condition hit while parsing an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMiss {
    /// The body was empty or whitespace only.
    EmptyBody,
    /// The payment marker phrase was not found.
    NoMarker,
    /// Marker found, but no amount followed by the currency token.
    NoAmount,
    /// Marker found, but no merchant detail.
    NoDetail,
    /// The date header did not parse.
    InvalidDate { raw: String },
}

impl ParseMiss {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EmptyBody => "empty_body",
            Self::NoMarker => "no_marker",
            Self::NoAmount => "no_amount",
            Self::NoDetail => "no_detail",
            Self::InvalidDate { .. } => "invalid_date",
        }
    }
}

/// Receives recoverable parse outcomes.
///
/// The parser never logs on its own; callers decide where misses go.
pub trait ParseObserver: Send + Sync {
    /// Called once per recoverable miss.
    fn miss(&self, miss: &ParseMiss);

    /// Called when a record was produced.
    fn extracted(&self, _record: &ExpenseRecord) {}
}

/// Observer that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ParseObserver for NoopObserver {
    fn miss(&self, _miss: &ParseMiss) {}
}

/// Observer that forwards to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ParseObserver for TracingObserver {
    fn miss(&self, miss: &ParseMiss) {
        match miss {
            ParseMiss::InvalidDate { raw } => {
                warn!(raw_date = %raw, "Failed to parse date header");
            }
            other => debug!(miss = other.label(), "Parse miss"),
        }
    }

    fn extracted(&self, record: &ExpenseRecord) {
        info!(
            date = %record.date,
            amount = record.amount.as_deref().unwrap_or("-"),
            detail = record.detail.as_deref().unwrap_or("-"),
            "Extracted expense"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_constructor_keeps_absent_fields() {
        let record = ExpenseRecord::new("2025-10-23", Some("1.20"), None::<String>);
        assert_eq!(record.amount.as_deref(), Some("1.20"));
        assert!(record.detail.is_none());
        assert_eq!(record.date, "2025-10-23");
    }

    #[test]
    fn empty_date_means_unknown() {
        let record = ExpenseRecord::new("", None::<String>, Some("BAR"));
        assert!(record.date.is_empty());
        assert_eq!(record.detail.as_deref(), Some("BAR"));
    }

    #[test]
    fn classified_expense_serializes_flat() {
        let classified = ClassifiedExpense {
            record: ExpenseRecord::new("2025-10-15", Some("1.35"), Some("METRO DE MALAGA")),
            category: "transporte".into(),
        };
        let json = serde_json::to_value(&classified).unwrap();
        assert_eq!(json["date"], "2025-10-15");
        assert_eq!(json["amount"], "1.35");
        assert_eq!(json["detail"], "METRO DE MALAGA");
        assert_eq!(json["category"], "transporte");
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let classified = ClassifiedExpense {
            record: ExpenseRecord::new("", None::<String>, None::<String>),
            category: UNCATEGORIZED.into(),
        };
        let json = serde_json::to_value(&classified).unwrap();
        assert!(json["amount"].is_null());
        assert!(json["detail"].is_null());
    }

    #[test]
    fn parse_miss_labels() {
        assert_eq!(ParseMiss::NoMarker.label(), "no_marker");
        assert_eq!(
            ParseMiss::InvalidDate { raw: "x".into() }.label(),
            "invalid_date"
        );
    }
}
