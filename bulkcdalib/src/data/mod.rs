//! Data collection: ingest report members into indices and histograms.
//!
//! This module handles the second stage of the pipeline - turning the lines
//! of feature and histogram files into counts. It provides:
//!
//! - **Ingestion**: line-stream parser feeding any `FeatureSink`
//! - **Indices**: `CorrelatorIndex`, one per feature category
//! - **Correlation**: High-level API (`correlate`) over many reports
//! - **Histograms**: per-report histograms and `diff_reports`
//! - **Reports**: `analyze_report` summaries and `validate_report`, each with
//!   a `*_matching` variant that selects members by glob pattern
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulkcdalib::data::{correlate, CorrelateOptions};
//!
//! let result = correlate(&sources, &CorrelateOptions::new())?;
//! println!("Drives: {}", result.report.drives_processed);
//! ```

pub mod analyze;
pub mod correlate;
pub mod diff;
pub mod histogram;
pub mod index;
pub mod ingest;
pub mod validate;

pub use analyze::{
    analyze_matching, analyze_report, FeatureFileSummary, HistogramSummary, ReportSummary,
    ScannerRow,
};
pub use correlate::{
    all_drives, correlate, CorrelateOptions, CorrelationResult, FileFailure, RunReport,
    SourceReport, DEFAULT_CATEGORIES, DEFAULT_THRESHOLD,
};
pub use diff::{
    compare_rows, diff_histograms, diff_reports, DiffOptions, DiffRow, HistogramDiff,
    HistogramDiffResult,
};
pub use histogram::{read_histogram, Histogram};
pub use index::{CorrelatorIndex, FeatureSink};
pub use ingest::{
    ingest_stream, DecodeWarning, IngestMode, IngestOptions, IngestReport, MalformedLine,
};
pub use validate::{
    validate_matching, validate_report, LineProblem, MemberValidation, ValidationReport,
};
