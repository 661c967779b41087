//! # bulkcdalib
//!
//! Cross-drive analysis of bulk_extractor reports.
//!
//! ## Overview
//!
//! A bulk_extractor scan leaves behind a report: a directory (or zip archive)
//! of text files listing every email address, credit-card number, phone
//! number and so on found on one disk image. Looked at one at a time, these
//! reports are long lists. Looked at together, they show which drives share
//! identities:
//!
//! - **Correlation**: per category, which features occur on which drives
//! - **Stoplists**: features so common across drives they carry no signal
//! - **Affinity**: drive pairs ranked by the rare features they share
//! - **Histogram diff**: what grew between two scans of the same evidence
//!
//! ## Pipeline
//!
//! 1. [`source`]: open directory and zip reports, classify lines, read `report.xml`
//! 2. [`data`]: ingest members into [`CorrelatorIndex`]es and histograms
//! 3. [`query`]: stoplists and affinity scores from finished indices
//! 4. [`output`]: presentation-ready [`ReportTable`]s
//!
//! ## Example
//!
//! ```rust
//! use bulkcdalib::{correlate, rank_all_pairs, CorrelateOptions, ReportSource, StoplistReport};
//! use std::fs;
//! use tempfile::tempdir;
//!
//! // Two reports that share one address
//! let root = tempdir().unwrap();
//! for (name, email) in [("disk1", "shared@x.com"), ("disk2", "shared@x.com")] {
//!     let dir = root.path().join(name);
//!     fs::create_dir(&dir).unwrap();
//!     fs::write(
//!         dir.join("email.txt"),
//!         format!("# Filename: {name}.raw\n1024\t{email}\tctx\n"),
//!     )
//!     .unwrap();
//! }
//!
//! let sources = vec![
//!     ReportSource::open(root.path().join("disk1")).unwrap(),
//!     ReportSource::open(root.path().join("disk2")).unwrap(),
//! ];
//! let options = CorrelateOptions::new().categories(vec!["email".to_string()]);
//! let result = correlate(&sources, &options).unwrap();
//!
//! let stoplist = StoplistReport::build(&result.indices, result.total_drive_count, 0.667);
//! assert!(stoplist.features.contains("shared@x.com"));
//!
//! let ranking = rank_all_pairs(&result.indices, &result.drives());
//! assert_eq!(ranking[0].score, 0.5);
//! ```

pub mod data;
pub mod error;
pub mod output;
pub mod query;
pub mod source;

pub use data::{
    analyze_matching, analyze_report, correlate, diff_reports, validate_matching, validate_report,
    CorrelateOptions, CorrelationResult, CorrelatorIndex, DiffOptions, FeatureSink,
    HistogramDiffResult, IngestReport, ReportSummary, RunReport, ValidationReport,
};
pub use error::CdaError;
pub use output::{ReportTable, TableRow};
pub use query::{
    build_stoplist, rank_all_pairs, score, write_stoplist, AffinityScore, StoplistReport,
};
pub use source::{ReportMetadata, ReportSource};

/// Result type for bulkcdalib operations
pub type Result<T> = std::result::Result<T, CdaError>;
