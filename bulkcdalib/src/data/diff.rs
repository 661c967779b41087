//! Histogram differences between two reports of the same kind of evidence.
//!
//! Typical use: a drive scanned before (`pre`) and after (`post`) some event.
//! For every histogram both reports contain, the features whose count grew
//! are listed with the size of the change.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::source::ReportSource;
use crate::Result;

use super::histogram::{read_histogram, Histogram};

/// Options for [`diff_reports`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Also keep rows whose count stayed the same or got smaller.
    pub smaller: bool,
}

impl DiffOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep unchanged and shrinking features.
    pub fn smaller(mut self, yes: bool) -> Self {
        self.smaller = yes;
        self
    }
}

/// One feature's counts in both reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRow {
    /// Count in the pre report (0 when absent)
    pub pre: u64,
    /// Count in the post report (0 when absent)
    pub post: u64,
    /// `post - pre`, saturated to the `i64` range
    pub delta: i64,
    /// The feature
    pub feature: String,
}

impl DiffRow {
    fn new(feature: &str, pre: u64, post: u64) -> Self {
        Self {
            pre,
            post,
            delta: delta(pre, post),
            feature: feature.to_string(),
        }
    }
}

fn delta(pre: u64, post: u64) -> i64 {
    let wide = i128::from(post) - i128::from(pre);
    i64::try_from(wide).unwrap_or(if wide > 0 { i64::MAX } else { i64::MIN })
}

/// Row order: delta descending, then feature, then post count, then pre count.
pub fn compare_rows(a: &DiffRow, b: &DiffRow) -> Ordering {
    b.delta
        .cmp(&a.delta)
        .then_with(|| a.feature.cmp(&b.feature))
        .then_with(|| a.post.cmp(&b.post))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Differences for one histogram member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramDiff {
    /// Member name, e.g. `email_histogram.txt`
    pub name: String,
    /// Rows kept by the [`DiffOptions`], in [`compare_rows`] order
    pub rows: Vec<DiffRow>,
    /// Features whose count differs between the reports
    pub changed: usize,
}

impl HistogramDiff {
    /// True when every feature has the same count in both reports.
    pub fn no_differences(&self) -> bool {
        self.changed == 0
    }
}

/// Result of comparing two reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramDiffResult {
    /// Display name of the pre report
    pub pre_name: String,
    /// Display name of the post report
    pub post_name: String,
    /// Image the pre report was made from
    pub pre_image: Option<String>,
    /// Image the post report was made from
    pub post_image: Option<String>,
    /// Members only the pre report has
    pub only_in_pre: Vec<String>,
    /// Members only the post report has
    pub only_in_post: Vec<String>,
    /// One entry per histogram common to both reports, by member name
    pub histograms: Vec<HistogramDiff>,
}

/// Compare two histograms.
pub fn diff_histograms(
    name: &str,
    pre: &Histogram,
    post: &Histogram,
    options: &DiffOptions,
) -> HistogramDiff {
    let features: BTreeSet<&str> = pre.iter().chain(post.iter()).map(|(f, _)| f).collect();

    let mut changed = 0;
    let mut rows = Vec::new();
    for feature in features {
        let row = DiffRow::new(feature, pre.get(feature), post.get(feature));
        if row.delta != 0 {
            changed += 1;
        }
        if row.delta > 0 || options.smaller {
            rows.push(row);
        }
    }
    rows.sort_by(compare_rows);

    HistogramDiff {
        name: name.to_string(),
        rows,
        changed,
    }
}

/// Compare every histogram the two reports have in common.
pub fn diff_reports(
    pre: &ReportSource,
    post: &ReportSource,
    options: &DiffOptions,
) -> Result<HistogramDiffResult> {
    let only_in_pre = pre.members().difference(post.members()).cloned().collect();
    let only_in_post = post.members().difference(pre.members()).cloned().collect();

    let mut histograms = Vec::new();
    for name in pre.histogram_files() {
        if !post.has_member(name) {
            continue;
        }
        info!(histogram = name, "comparing");
        let (before, _) = read_histogram(pre, name)?;
        let (after, _) = read_histogram(post, name)?;
        histograms.push(diff_histograms(name, &before, &after, options));
    }

    Ok(HistogramDiffResult {
        pre_name: pre.name(),
        post_name: post.name(),
        pre_image: pre.image_file_path()?,
        post_image: post.image_file_path()?,
        only_in_pre,
        only_in_post,
        histograms,
    })
}
