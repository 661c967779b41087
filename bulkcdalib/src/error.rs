//! Error types for bulkcdalib

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading reports and correlating features
#[derive(Error, Debug)]
pub enum CdaError {
    /// The report path is missing, is not a report, or lacks a requested member
    #[error("cannot read report '{path}': {reason}")]
    ReportUnreadable { path: PathBuf, reason: String },

    /// A report member violates the feature/histogram grammar
    #[error("{file}:{line}: malformed report line: {reason}")]
    MalformedReport {
        file: String,
        line: usize,
        reason: String,
    },

    /// Internal programming error; callers should not try to recover from it
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Invalid configuration or command-line argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Invalid glob pattern
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidGlob { pattern: String, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip archive error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// report.xml could not be parsed
    #[error("XML error in '{path}': {message}")]
    Xml { path: String, message: String },
}

impl CdaError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CdaError::ReportUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(file: &str, line: usize, reason: impl Into<String>) -> Self {
        CdaError::MalformedReport {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }
}
