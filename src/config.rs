//! Configuration types, built from environment variables.
//!
//! Every `from_env` has a `from_lookup` twin taking a key → value closure so
//! tests can feed values without touching the process environment.

use std::path::{Path, PathBuf};

use chrono::{Duration, Local, NaiveDate};
use secrecy::SecretString;

use crate::channels::DateRange;
use crate::error::ConfigError;
use crate::expenses::RecordParser;
use crate::expenses::parser::{DEFAULT_CONNECTOR, DEFAULT_CURRENCY, DEFAULT_MARKER};

/// Default location of the category file.
pub const DEFAULT_CATEGORIES_PATH: &str = "config/categories.json";

/// Local environment overrides, read from the working directory.
pub const ENV_FILE: &str = ".env.local";

/// Load `KEY=value` lines from `path` into the process environment.
///
/// Variables that are already set keep their value. Returns whether the file
/// was read; a missing file is not an error.
pub fn load_env_file(path: impl AsRef<Path>) -> bool {
    dotenvy::from_filename(path.as_ref()).is_ok()
}

/// Default Google Sheets API root.
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

// ── IMAP ────────────────────────────────────────────────────────────

/// Mailbox connection and search filters.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub mailbox: String,
    /// `FROM` search criterion, if any.
    pub search_from: Option<String>,
    /// `SUBJECT` search criterion, if any.
    pub search_subject: Option<String>,
}

impl ImapConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = optional(&lookup, "IMAP_SERVER").unwrap_or_else(|| "imap.gmail.com".into());

        let port = match optional(&lookup, "IMAP_PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "IMAP_PORT".into(),
                message: format!("`{raw}` is not a port number"),
            })?,
            None => 993,
        };

        Ok(Self {
            host,
            port,
            username: required(&lookup, "EMAIL_USER")?,
            password: SecretString::from(required(&lookup, "EMAIL_PASS")?),
            mailbox: optional(&lookup, "IMAP_MAILBOX").unwrap_or_else(|| "INBOX".into()),
            search_from: optional(&lookup, "SEARCH_FROM"),
            search_subject: optional(&lookup, "SEARCH_SUBJECT"),
        })
    }
}

// ── Sheets ──────────────────────────────────────────────────────────

/// How the ledger obtains its OAuth bearer token.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    /// Service-account key file; tokens are minted and refreshed from it.
    ServiceAccount(PathBuf),
    /// Pre-obtained token with the spreadsheets scope, used as-is.
    Token(SecretString),
}

/// Target spreadsheet for the ledger append.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    pub auth: SheetsAuth,
    /// A1-notation range the append starts from.
    pub range: String,
    pub api_base: String,
}

impl SheetsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// `SHEETS_ACCESS_TOKEN` overrides `SERVICE_ACCOUNT_KEY_PATH`; one of the
    /// two is required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let auth = match optional(&lookup, "SHEETS_ACCESS_TOKEN") {
            Some(token) => SheetsAuth::Token(SecretString::from(token)),
            None => SheetsAuth::ServiceAccount(
                required(&lookup, "SERVICE_ACCOUNT_KEY_PATH")?.into(),
            ),
        };
        Ok(Self {
            spreadsheet_id: required(&lookup, "SPREADSHEET_ID")?,
            auth,
            range: optional(&lookup, "SHEETS_RANGE").unwrap_or_else(|| "A1".into()),
            api_base: optional(&lookup, "SHEETS_API_BASE")
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.into()),
        })
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Notification format recognised by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub marker: String,
    pub currency: String,
    pub connector: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            currency: DEFAULT_CURRENCY.to_string(),
            connector: DEFAULT_CONNECTOR.to_string(),
        }
    }
}

impl ExtractionConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        // The marker keeps its own spacing; only blank values fall back.
        let marker = lookup("EXPENSES_MARKER")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.marker);
        Self {
            marker,
            currency: optional(&lookup, "EXPENSES_CURRENCY").unwrap_or(defaults.currency),
            connector: optional(&lookup, "EXPENSES_CONNECTOR").unwrap_or(defaults.connector),
        }
    }

    /// Compile the configured patterns.
    pub fn parser(&self) -> Result<RecordParser, ConfigError> {
        RecordParser::new(&self.marker, &self.currency, &self.connector).map_err(|e| {
            ConfigError::InvalidValue {
                key: "EXPENSES_MARKER".into(),
                message: e.to_string(),
            }
        })
    }
}

// ── Run window ──────────────────────────────────────────────────────

fn parse_day(key: &str, raw: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("`{raw}` is not a YYYY-MM-DD date: {e}"),
    })
}

/// Resolve the search window; defaults to the whole of yesterday.
pub fn window_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
    today: NaiveDate,
) -> Result<DateRange, ConfigError> {
    let since = match optional(&lookup, "EXPENSES_SINCE") {
        Some(raw) => parse_day("EXPENSES_SINCE", &raw)?,
        None => today - Duration::days(1),
    };
    let before = match optional(&lookup, "EXPENSES_BEFORE") {
        Some(raw) => parse_day("EXPENSES_BEFORE", &raw)?,
        None => since + Duration::days(1),
    };
    DateRange::new(since, before).ok_or_else(|| ConfigError::InvalidValue {
        key: "EXPENSES_BEFORE".into(),
        message: format!("{before} is not after {since}"),
    })
}

// ── Application ─────────────────────────────────────────────────────

/// Everything the binary needs for one run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub imap: ImapConfig,
    pub sheets: SheetsConfig,
    pub categories_path: PathBuf,
    pub extraction: ExtractionConfig,
    pub window: DateRange,
    /// Directory for daily rolling log files; stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup, Local::now().date_naive())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        today: NaiveDate,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            imap: ImapConfig::from_lookup(&lookup)?,
            sheets: SheetsConfig::from_lookup(&lookup)?,
            categories_path: optional(&lookup, "CATEGORIES_PATH")
                .unwrap_or_else(|| DEFAULT_CATEGORIES_PATH.into())
                .into(),
            extraction: ExtractionConfig::from_lookup(&lookup),
            window: window_from_lookup(&lookup, today)?,
            log_dir: log_dir_from_lookup(&lookup),
        })
    }
}

fn log_dir_from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    optional(lookup, "EXPENSES_LOG_DIR").map(PathBuf::from)
}

/// Log directory alone, read before the rest of the config so logging is up
/// when config errors are reported.
pub fn log_dir_from_env() -> Option<PathBuf> {
    log_dir_from_lookup(&env_lookup)
}
