//! Error types for the event study engine.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for event study computations.
#[derive(Error, Debug)]
pub enum EventStudyError {
    #[error("Date {date} not found in series '{series}' (searched {searched} adjacent days)")]
    DateNotFound {
        date: NaiveDate,
        series: String,
        searched: u32,
    },

    #[error("Insufficient history in series '{series}': {message}")]
    InsufficientHistory { series: String, message: String },

    #[error("Singular fit: {0}")]
    SingularFit(String),

    #[error("Malformed input at record {record}: {message}")]
    MalformedInput { record: usize, message: String },

    #[error("Series unavailable: {0}")]
    SeriesUnavailable(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParseError(#[from] chrono::ParseError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Coarse classification of a failure, used in batch error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Event date absent from the series and no adjacent trading day resolved.
    DateNotFound,
    /// Estimation or event window exceeds available series bounds.
    InsufficientHistory,
    /// Regression design matrix not invertible.
    SingularFit,
    /// A batch record could not be parsed into an event specification.
    MalformedInput,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::DateNotFound => "DateNotFound",
            ErrorKind::InsufficientHistory => "InsufficientHistory",
            ErrorKind::SingularFit => "SingularFit",
            ErrorKind::MalformedInput => "MalformedInput",
        };
        f.write_str(s)
    }
}

impl EventStudyError {
    /// Classify this error into the batch reporting taxonomy.
    ///
    /// Data-layer failures (missing series, short series, parse errors)
    /// all surface as `InsufficientHistory` at the batch level: the event
    /// could not be computed because its data was not available in full.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventStudyError::DateNotFound { .. } => ErrorKind::DateNotFound,
            EventStudyError::SingularFit(_) => ErrorKind::SingularFit,
            EventStudyError::MalformedInput { .. } => ErrorKind::MalformedInput,
            _ => ErrorKind::InsufficientHistory,
        }
    }
}

/// Result type alias for event study operations.
pub type Result<T> = std::result::Result<T, EventStudyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        let e = EventStudyError::DateNotFound {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            series: "AAPL".to_string(),
            searched: 4,
        };
        assert_eq!(e.kind(), ErrorKind::DateNotFound);

        let e = EventStudyError::SingularFit("constant factor".to_string());
        assert_eq!(e.kind(), ErrorKind::SingularFit);

        let e = EventStudyError::SeriesUnavailable("SPY".to_string());
        assert_eq!(e.kind(), ErrorKind::InsufficientHistory);

        let e = EventStudyError::MalformedInput {
            record: 3,
            message: "bad date".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_display_contains_context() {
        let e = EventStudyError::InsufficientHistory {
            series: "AAPL".to_string(),
            message: "need 300 rows before the event window, have 120".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("AAPL"));
        assert!(msg.contains("300"));
    }
}
