//! Error types for Coach Score

use thiserror::Error;

/// Errors that can occur during scoring
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Unknown fitness test: {0}")]
    UnknownTest(String),

    #[error("Unsupported gender: {0:?} (expected \"M\" or \"F\")")]
    UnsupportedGender(String),

    #[error("Invalid raw value: {0}")]
    InvalidValue(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),
}
