//! Error types for the dashboard core.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by Record Store mutations and lookups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("student id already registered: {0}")]
    DuplicateId(String),

    #[error("required field is missing: {0}")]
    MissingField(&'static str),

    #[error("student not found: {0}")]
    UnknownStudent(String),
}

/// Errors from the text-generation collaborator.
///
/// These never leave the insight service; they are logged and replaced by
/// fallback values.
#[derive(Debug, Error)]
pub enum InsightError {
    #[error("text generation credential is not configured")]
    MissingCredentials,

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider API error: {0}")]
    ProviderApi(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors from loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
}

/// Errors from roster CSV import and attendance CSV export.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: StoreError,
    },
}
