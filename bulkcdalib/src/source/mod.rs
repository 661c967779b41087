//! Report sources: find and read bulk_extractor output.
//!
//! This module handles the first stage of the pipeline - getting at the text
//! files a scan produced. It provides:
//!
//! - **Report access**: one API over output directories and zip archives
//! - **Line classification**: comments, property banners, histogram lines
//! - **Report metadata**: version, image path and scanner timings from `report.xml`
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulkcdalib::source::ReportSource;
//!
//! let report = ReportSource::open("/cases/disk1-report.zip")?;
//! for member in report.histogram_files() {
//!     println!("{member}");
//! }
//! ```

pub mod lines;
pub mod report;
pub mod xml;

pub use lines::{is_comment_line, is_histogram_line, property_line};
pub use report::{ReportKind, ReportSource, REPORT_XML};
pub use xml::{ReportMetadata, ScannerTime};
