//! Record parser — turns a `Date` header and a plain-text body into an
//! [`ExpenseRecord`].
//!
//! Bank notifications look like:
//!
//! ```text
//! Te escribimos para comunicarte el pago de 1.20 EUR con tu tarjeta
//! acabada en 3096 en CAFETERIA NAVAR.
//! ```
//!
//! The marker phrase identifies a payment notice; everything up to the next
//! line break is the span searched for the amount and the merchant. Nothing
//! here fails: misses are reported to a [`ParseObserver`] and become absent
//! fields or a `None` record.

use std::sync::OnceLock;

use chrono::DateTime;
use regex::Regex;

use crate::expenses::types::{ExpenseRecord, ParseMiss, ParseObserver};

/// Lead-in phrase of a card payment notification.
pub const DEFAULT_MARKER: &str = "Te escribimos para comunicarte el pago ";

/// Currency token that follows the amount.
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Word that introduces the card number and then the merchant.
pub const DEFAULT_CONNECTOR: &str = "en";

/// Compiled patterns for one notification format.
#[derive(Debug, Clone)]
pub struct RecordParser {
    marker: Regex,
    amount: Regex,
    detail: Regex,
}

impl RecordParser {
    /// Build a parser for a marker phrase, currency token and connector word.
    ///
    /// All three are matched literally. The marker is case-insensitive, the
    /// other two are not.
    pub fn new(marker: &str, currency: &str, connector: &str) -> Result<Self, regex::Error> {
        let connector = regex::escape(connector);
        Ok(Self {
            marker: Regex::new(&format!("(?i){}[^\\n]*", regex::escape(marker)))?,
            amount: Regex::new(&format!(r"(\d+[.,]\d{{2}})\s*{}", regex::escape(currency)))?,
            detail: Regex::new(&format!(r"{connector}\s+[^.]*{connector}\s+([^.]*)\."))?,
        })
    }

    /// Parse one message: normalize the date header, then extract the body.
    pub fn parse(
        &self,
        date_header: &str,
        body: &str,
        observer: &dyn ParseObserver,
    ) -> Option<ExpenseRecord> {
        let date = normalize_date(date_header, observer);
        self.parse_body(&date, body, observer)
    }

    /// Extract an expense from a body, or `None` when it is not a payment notice.
    pub fn parse_body(
        &self,
        date: &str,
        body: &str,
        observer: &dyn ParseObserver,
    ) -> Option<ExpenseRecord> {
        if body.trim().is_empty() {
            observer.miss(&ParseMiss::EmptyBody);
            return None;
        }

        let Some(found) = self.marker.find(body) else {
            observer.miss(&ParseMiss::NoMarker);
            return None;
        };
        let span = found.as_str().trim();

        let amount = self
            .amount
            .captures(span)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        if amount.is_none() {
            observer.miss(&ParseMiss::NoAmount);
        }

        // Greedy up to the period; trailing spaces before it are dropped.
        let detail = self
            .detail
            .captures(span)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string());
        if detail.is_none() {
            observer.miss(&ParseMiss::NoDetail);
        }

        let record = ExpenseRecord {
            date: date.to_string(),
            amount,
            detail,
        };
        observer.extracted(&record);
        Some(record)
    }
}

impl Default for RecordParser {
    fn default() -> Self {
        static DEFAULT: OnceLock<RecordParser> = OnceLock::new();
        DEFAULT
            .get_or_init(|| {
                RecordParser::new(DEFAULT_MARKER, DEFAULT_CURRENCY, DEFAULT_CONNECTOR)
                    .expect("invalid default expense patterns")
            })
            .clone()
    }
}

fn trailing_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\([^()]*\)\s*$").expect("invalid comment regex"))
}

/// Convert an RFC 2822 date header to `YYYY-MM-DD`.
///
/// The calendar date is taken in the header's own offset. A header with no
/// zone is read as written (`-0000`, local time unknown). Returns an empty
/// string (and reports [`ParseMiss::InvalidDate`]) when the header does not
/// parse.
pub fn normalize_date(raw: &str, observer: &dyn ParseObserver) -> String {
    let cleaned = trailing_comment_re().replace(raw.trim(), "");
    let parsed = DateTime::parse_from_rfc2822(&cleaned)
        .or_else(|_| DateTime::parse_from_rfc2822(&format!("{cleaned} -0000")));
    match parsed {
        Ok(dt) => dt.format("%Y-%m-%d").to_string(),
        Err(_) => {
            observer.miss(&ParseMiss::InvalidDate {
                raw: raw.to_string(),
            });
            String::new()
        }
    }
}
