//! Stoplists: features that occur on too many drives to be interesting.
//!
//! A feature is stoplisted when the number of drives it occurs on reaches
//! `floor(total_drive_count × threshold)`. The product is truncated toward
//! zero before the comparison, so with three drives and the default
//! threshold of 0.667 the required drive count is `floor(2.001) = 2`.
//!
//! `total_drive_count` is the number of reports in the run, not the number
//! of drives an index happens to know about: a drive with no features in a
//! category still counts against the denominator.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::index::CorrelatorIndex;
use crate::error::CdaError;
use crate::Result;

/// Minimum number of drives a feature must be on to be stoplisted.
pub fn required_drive_count(total_drive_count: usize, threshold: f64) -> usize {
    (total_drive_count as f64 * threshold) as usize
}

/// Build the stoplist for one category.
pub fn build_stoplist(
    index: &CorrelatorIndex,
    total_drive_count: usize,
    threshold: f64,
) -> BTreeSet<String> {
    let required = required_drive_count(total_drive_count, threshold);
    index
        .drive_counts()
        .filter(|&(_, drives)| drives >= required)
        .map(|(feature, _)| feature.to_string())
        .collect()
}

/// A stoplist across several categories, with the drives-per-feature
/// distribution it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoplistReport {
    /// Stoplisted features, sorted
    pub features: BTreeSet<String>,
    /// Threshold fraction used
    pub threshold: f64,
    /// Number of reports in the run
    pub total_drive_count: usize,
    /// `floor(total_drive_count × threshold)`
    pub required_drive_count: usize,
    /// Drives-per-feature → number of features with that many drives
    pub drives_per_feature: BTreeMap<usize, usize>,
}

impl StoplistReport {
    /// Build the combined stoplist for all categories.
    pub fn build(indices: &[CorrelatorIndex], total_drive_count: usize, threshold: f64) -> Self {
        let mut features = BTreeSet::new();
        let mut drives_per_feature = BTreeMap::new();

        for index in indices {
            for (_, drives) in index.drive_counts() {
                *drives_per_feature.entry(drives).or_insert(0) += 1;
            }
            features.extend(build_stoplist(index, total_drive_count, threshold));
        }

        Self {
            features,
            threshold,
            total_drive_count,
            required_drive_count: required_drive_count(total_drive_count, threshold),
            drives_per_feature,
        }
    }

    /// Number of stoplisted features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// True when nothing reached the threshold.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Write a stoplist: one feature per line, sorted, no header.
///
/// Refuses to overwrite an existing file.
pub fn write_stoplist(path: impl AsRef<Path>, features: &BTreeSet<String>) -> Result<()> {
    let path = path.as_ref();
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => {
                CdaError::InvalidArgument(format!("{}: file exists", path.display()))
            }
            _ => CdaError::Io(e),
        })?;

    let mut out = BufWriter::new(file);
    for feature in features {
        writeln!(out, "{feature}")?;
    }
    out.flush()?;
    Ok(())
}
