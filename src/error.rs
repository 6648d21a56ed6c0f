//! Error types for expense ingestion.
//!
//! Parse misses are not errors: they end up as absent fields or a skipped
//! message. Only configuration and the two transport collaborators can fail.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Category file not found: {0}")]
    CategoriesNotFound(String),

    #[error("Malformed category file {path}: {reason}")]
    MalformedCategories { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mail retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to connect: {reason}")]
    ConnectFailed { name: String, reason: String },

    #[error("Authentication failed for channel {name}: {reason}")]
    AuthFailed { name: String, reason: String },

    #[error("Search failed on channel {name}: {reason}")]
    SearchFailed { name: String, reason: String },

    #[error("Channel {name} disconnected: {reason}")]
    Disconnected { name: String, reason: String },

    #[error("Retrieval task failed: {0}")]
    Task(String),
}

/// Ledger append errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger {ledger} request failed: {reason}")]
    RequestFailed { ledger: String, reason: String },

    #[error("Ledger {ledger} rejected append with status {status}: {body}")]
    Rejected {
        ledger: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {ledger}: {reason}")]
    InvalidResponse { ledger: String, reason: String },

    #[error("Ledger {ledger} authentication failed: {reason}")]
    AuthFailed { ledger: String, reason: String },
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mail fetch failed: {0}")]
    Fetch(#[from] ChannelError),

    #[error("Ledger append failed: {0}")]
    Append(#[from] LedgerError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
