//! Output formatting: present results as tables.
//!
//! This module handles the fourth and final stage of the pipeline -
//! formatting query results for display. It provides:
//!
//! - **ReportTable**: Table-ready data structure with headers, rows, and footer
//! - **TableRow**: Individual row with label and formatted values
//!
//! ReportTable is a pure presentation layer - it only formats data into
//! strings. All ingestion, scoring and sorting happens in earlier stages.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bulkcdalib::output::ReportTable;
//!
//! let table = ReportTable::from_stoplist(&stoplist);
//! // table.headers: ["Drives", "Features"]
//! // table.rows: [TableRow { label: "1", values: ["5120"] }, ...]
//! // table.footer: Some(TableRow { label: "Stoplisted", ... })
//! ```

pub mod table;

pub use table::{ReportTable, TableRow};
