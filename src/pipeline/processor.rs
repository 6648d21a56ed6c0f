//! Pipeline processor — wires retrieval, parsing, classification and append.

use std::sync::Arc;

use tracing::{debug, info};

use crate::channels::{DateRange, MailSource, RawMail};
use crate::error::PipelineError;
use crate::expenses::{
    ClassifiedExpense, Classifier, ExpenseRecord, ParseObserver, RecordParser, TracingObserver,
};
use crate::ledger::{AppendSummary, LedgerRow, LedgerSink};

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages returned by the mail source.
    pub fetched: usize,
    /// Messages that produced an expense record.
    pub extracted: usize,
    /// Ledger report; `None` when nothing was appended.
    pub appended: Option<AppendSummary>,
}

/// Runs retrieval → parse → classify → append.
pub struct ExpensePipeline {
    source: Arc<dyn MailSource>,
    ledger: Arc<dyn LedgerSink>,
    parser: RecordParser,
    classifier: Classifier,
    observer: Arc<dyn ParseObserver>,
}

impl ExpensePipeline {
    /// Create a pipeline that reports parse misses through `tracing`.
    pub fn new(
        source: Arc<dyn MailSource>,
        ledger: Arc<dyn LedgerSink>,
        parser: RecordParser,
        classifier: Classifier,
    ) -> Self {
        Self {
            source,
            ledger,
            parser,
            classifier,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the parse observer.
    pub fn with_observer(mut self, observer: Arc<dyn ParseObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Parse fetched mails, dropping those that are not payment notices.
    pub fn extract(&self, mails: &[RawMail]) -> Vec<ExpenseRecord> {
        mails
            .iter()
            .filter_map(|mail| {
                self.parser
                    .parse(&mail.date_header, &mail.body, self.observer.as_ref())
            })
            .collect()
    }

    /// Classify extracted records in order.
    pub fn classify(&self, records: Vec<ExpenseRecord>) -> Vec<ClassifiedExpense> {
        self.classifier.classify_batch(records)
    }

    /// Run once over `range`.
    pub async fn run(&self, range: &DateRange) -> Result<RunSummary, PipelineError> {
        info!(
            source = self.source.name(),
            ledger = self.ledger.name(),
            since = %range.since(),
            before = %range.before(),
            "Starting expense ingestion"
        );

        let mails = self.source.fetch(range).await?;
        let records = self.extract(&mails);
        let mut summary = RunSummary {
            fetched: mails.len(),
            extracted: records.len(),
            appended: None,
        };
        debug!(
            fetched = summary.fetched,
            extracted = summary.extracted,
            "Parsed fetched mails"
        );

        if records.is_empty() {
            info!(fetched = summary.fetched, "No expenses retrieved, nothing to append");
            return Ok(summary);
        }

        let classified = self.classify(records);
        let rows: Vec<LedgerRow> = classified.iter().map(LedgerRow::from).collect();
        let appended = self.ledger.append(&rows).await?;
        summary.appended = Some(appended);

        info!(
            fetched = summary.fetched,
            extracted = summary.extracted,
            rows = appended.updated_rows,
            cells = appended.updated_cells,
            "Expense ingestion complete"
        );
        Ok(summary)
    }
}
