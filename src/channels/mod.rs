//! Mail retrieval — the source of raw notification emails.

pub mod imap;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ChannelError;

pub use imap::ImapMailSource;

/// Half-open day window `[since, before)`, as IMAP `SINCE`/`BEFORE` use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    since: NaiveDate,
    before: NaiveDate,
}

impl DateRange {
    /// `None` unless `since < before`.
    pub fn new(since: NaiveDate, before: NaiveDate) -> Option<Self> {
        (since < before).then_some(Self { since, before })
    }

    /// The single day `day`.
    pub fn day(day: NaiveDate) -> Option<Self> {
        Self::new(day, day.succ_opt()?)
    }

    pub fn since(&self) -> NaiveDate {
        self.since
    }

    pub fn before(&self) -> NaiveDate {
        self.before
    }
}

/// One retrieved message, reduced to what the parser needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMail {
    /// Raw `Date` header value; empty when the message had none.
    pub date_header: String,
    /// Decoded plain-text body.
    pub body: String,
}

impl RawMail {
    pub fn new(date_header: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            date_header: date_header.into(),
            body: body.into(),
        }
    }
}

/// Trait for mail sources — pure I/O, no parsing of expense content.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Source name for logging (e.g. "imap").
    fn name(&self) -> &str;

    /// Fetch every matching message received inside `range`, oldest first.
    async fn fetch(&self, range: &DateRange) -> Result<Vec<RawMail>, ChannelError>;
}
