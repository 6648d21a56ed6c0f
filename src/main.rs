use std::path::Path;
use std::sync::Arc;

use expense_ingest::channels::ImapMailSource;
use expense_ingest::config::{self, AppConfig};
use expense_ingest::error::Error;
use expense_ingest::expenses::{CategoryTable, Classifier};
use expense_ingest::ledger::SheetsLedger;
use expense_ingest::pipeline::{ExpensePipeline, RunSummary};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const LOG_FILE_PREFIX: &str = "expense-ingest.log";

/// Stdout logging, plus a daily rolling file when `log_dir` is set.
/// The returned guard must live until exit or buffered file lines are lost.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .init();

    guard
}

/// Load categories, wire the collaborators and run once over the window.
async fn run(config: &AppConfig) -> Result<RunSummary, Error> {
    let categories = CategoryTable::load(&config.categories_path)?;
    tracing::info!(
        categories = categories.len(),
        path = %config.categories_path.display(),
        "Loaded categories"
    );

    let parser = config.extraction.parser()?;
    let source = Arc::new(ImapMailSource::new(config.imap.clone()));
    let ledger = Arc::new(SheetsLedger::new(config.sheets.clone())?);
    let pipeline = ExpensePipeline::new(source, ledger, parser, Classifier::new(categories));

    Ok(pipeline.run(&config.window).await?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let env_loaded = config::load_env_file(config::ENV_FILE);

    let _log_guard = init_tracing(config::log_dir_from_env().as_deref());
    if env_loaded {
        tracing::debug!(file = config::ENV_FILE, "Loaded environment file");
    }

    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    let summary = run(&config).await.inspect_err(|e| {
        tracing::error!(error = %e, "Expense ingestion failed");
    })?;

    match summary.appended {
        Some(appended) => tracing::info!(
            fetched = summary.fetched,
            extracted = summary.extracted,
            rows = appended.updated_rows,
            "Run finished"
        ),
        None => tracing::info!(fetched = summary.fetched, "Run finished, no expenses found"),
    }

    Ok(())
}
