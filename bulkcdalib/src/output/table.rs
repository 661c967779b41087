//! Table-ready data structures for analysis output.
//!
//! This module provides `ReportTable`, a presentation-ready data structure
//! that can be printed directly or serialized to JSON.
//!
//! The data flow is:
//! 1. Raw Data (CorrelationResult, HistogramDiffResult, ReportSummary)
//! 2. Query results (StoplistReport, AffinityScore rankings)
//! 3. ReportTable (formatted strings for display)
//!
//! ReportTable is a pure presentation layer - it only formats data, no
//! filtering or sorting logic.

use serde::{Deserialize, Serialize};

use crate::data::analyze::ReportSummary;
use crate::data::correlate::RunReport;
use crate::data::diff::HistogramDiff;
use crate::data::index::CorrelatorIndex;
use crate::data::validate::ValidationReport;
use crate::query::affinity::AffinityScore;
use crate::query::stoplist::StoplistReport;

/// A single row in the table (data row or footer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Row label (source path, feature, drive name, "Total", etc.)
    pub label: String,
    /// Values for the remaining columns (as strings, ready for display)
    pub values: Vec<String>,
}

impl TableRow {
    fn new(label: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

/// Table-ready analysis output.
///
/// Renderers iterate over headers/rows/footer and apply styling - no
/// computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTable {
    /// Optional title (e.g., "email_histogram.txt")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Column headers: [label_header, column1, column2, ...]
    pub headers: Vec<String>,
    /// Data rows
    pub rows: Vec<TableRow>,
    /// Optional summary row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<TableRow>,
    /// Optional text below the table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<String>,
}

impl ReportTable {
    fn new(headers: &[&str]) -> Self {
        Self {
            title: None,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            footer: None,
            legend: None,
        }
    }

    /// Per-source ingestion summary of a correlation run.
    pub fn from_run_report(report: &RunReport) -> Self {
        let mut table = Self::new(&[
            "Source",
            "Drives",
            "Files",
            "Malformed",
            "Decode warnings",
            "Missing",
            "Failed",
        ]);
        table.title = Some(format!("Drives processed: {}", report.drives_processed));
        table.rows = report
            .sources
            .iter()
            .map(|s| {
                TableRow::new(
                    s.path.display().to_string(),
                    vec![
                        s.drives.len().to_string(),
                        s.files.len().to_string(),
                        s.malformed_lines().to_string(),
                        s.decode_warnings().to_string(),
                        s.missing_members.len().to_string(),
                        s.failures.len().to_string(),
                    ],
                )
            })
            .collect();
        table.footer = Some(TableRow::new(
            format!("Total ({} sources)", report.sources.len()),
            vec![
                report.drives_processed.to_string(),
                report.sources.iter().map(|s| s.files.len()).sum::<usize>().to_string(),
                report.malformed_lines().to_string(),
                report.decode_warnings().to_string(),
                report
                    .sources
                    .iter()
                    .map(|s| s.missing_members.len())
                    .sum::<usize>()
                    .to_string(),
                report.failures().to_string(),
            ],
        ));
        table
    }

    /// Drives-per-feature distribution behind a stoplist.
    pub fn from_stoplist(stoplist: &StoplistReport) -> Self {
        let mut table = Self::new(&["Drives", "Features"]);
        table.title = Some("Drives per feature".to_string());
        table.rows = stoplist
            .drives_per_feature
            .iter()
            .map(|(drives, features)| TableRow::new(drives.to_string(), vec![features.to_string()]))
            .collect();
        table.footer = Some(TableRow::new("Stoplisted", vec![stoplist.len().to_string()]));
        table.legend = Some(format!(
            "features on at least {} of {} drives (threshold {})",
            stoplist.required_drive_count, stoplist.total_drive_count, stoplist.threshold
        ));
        table
    }

    /// Ranked drive pairs. `limit` keeps only the first rows.
    pub fn from_affinity(ranking: &[AffinityScore], limit: Option<usize>) -> Self {
        let mut table = Self::new(&["Drive A", "Drive B", "Score", "Shared", "Top factors"]);
        table.title = Some("Drive affinity".to_string());
        table.rows = ranking
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|s| {
                let factors = s
                    .factors
                    .iter()
                    .map(|f| format!("{} ({:.3})", f.feature, f.weight))
                    .collect::<Vec<_>>()
                    .join(", ");
                TableRow::new(
                    s.drive_a.clone(),
                    vec![
                        s.drive_b.clone(),
                        format!("{:.4}", s.score),
                        s.shared.to_string(),
                        factors,
                    ],
                )
            })
            .collect();
        table.footer = Some(TableRow::new(format!("Total ({} pairs)", ranking.len()), Vec::new()));
        table
    }

    /// Features of one category ordered by how many drives they occur on.
    pub fn from_index_stats(index: &CorrelatorIndex, limit: Option<usize>) -> Self {
        let mut table = Self::new(&["Feature", "Drives"]);
        table.title = Some(format!(
            "{}: {} features on {} drives",
            index.category(),
            index.len(),
            index.drives().len()
        ));
        table.rows = index
            .sorted_by_drive_count()
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(feature, drives)| TableRow::new(feature, vec![drives.to_string()]))
            .collect();
        table
    }

    /// One histogram's differences.
    pub fn from_histogram_diff(diff: &HistogramDiff) -> Self {
        let mut table = Self::new(&["Feature", "# in PRE", "# in POST", "Δ"]);
        table.title = Some(diff.name.clone());
        table.rows = diff
            .rows
            .iter()
            .map(|r| {
                TableRow::new(
                    r.feature.clone(),
                    vec![r.pre.to_string(), r.post.to_string(), r.delta.to_string()],
                )
            })
            .collect();
        table.legend = Some(if diff.no_differences() {
            format!("{}: No differences", diff.name)
        } else {
            format!("{} features changed", diff.changed)
        });
        table
    }

    /// Scanner timings of a report, slowest first.
    pub fn from_scanner_times(summary: &ReportSummary) -> Self {
        let mut table = Self::new(&["Scanner", "Calls", "Sec", "Sec/call", "% total"]);
        table.title = Some("Scanner paths by time and calls".to_string());
        table.rows = summary
            .scanners
            .iter()
            .map(|s| {
                TableRow::new(
                    s.name.clone(),
                    vec![
                        s.calls.to_string(),
                        format!("{:.4}", s.seconds),
                        format!("{:.4}", s.per_call),
                        format!("{:.2}%", s.percent),
                    ],
                )
            })
            .collect();
        table.footer = Some(TableRow::new(
            "Total",
            vec![String::new(), format!("{:.4}", summary.total_seconds)],
        ));
        table
    }

    /// Histogram members of a report with their sizes.
    pub fn from_histogram_files(summary: &ReportSummary) -> Self {
        let mut table = Self::new(&["Histogram", "Entries", "Top"]);
        table.title = Some(format!("Histogram files: {}", summary.histograms.len()));
        table.rows = summary
            .histograms
            .iter()
            .map(|h| {
                TableRow::new(
                    h.name.clone(),
                    vec![h.entries.to_string(), h.top.clone().unwrap_or_default()],
                )
            })
            .collect();
        table
    }

    /// Feature file members of a report with their sizes.
    pub fn from_feature_files(summary: &ReportSummary) -> Self {
        let mut table = Self::new(&["Feature file", "Features"]);
        table.title = Some(format!("Feature files: {}", summary.feature_files.len()));
        table.rows = summary
            .feature_files
            .iter()
            .map(|f| TableRow::new(f.name.clone(), vec![f.features.to_string()]))
            .collect();
        table
    }

    /// Per-member validation results.
    pub fn from_validation(report: &ValidationReport) -> Self {
        let mut table = Self::new(&["Member", "Lines", "Problems"]);
        table.title = Some(format!("Validate {}", report.name));
        table.rows = report
            .members
            .iter()
            .map(|m| {
                TableRow::new(
                    m.member.clone(),
                    vec![m.lines.to_string(), m.problems.len().to_string()],
                )
            })
            .collect();
        table.footer = Some(TableRow::new(
            format!("Total ({} members)", report.members.len()),
            vec![
                report.members.iter().map(|m| m.lines).sum::<usize>().to_string(),
                report.problem_count().to_string(),
            ],
        ));
        table
    }
}
