//! Single-report histograms (`feature → count`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::source::ReportSource;
use crate::Result;

use super::index::FeatureSink;
use super::ingest::{ingest_stream, IngestMode, IngestOptions, IngestReport};

/// Feature counts read from one histogram member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Histogram {
    counts: HashMap<String, u64>,
}

impl Histogram {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a feature (0 when absent).
    pub fn get(&self, feature: &str) -> u64 {
        self.counts.get(feature).copied().unwrap_or(0)
    }

    /// Number of distinct features.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// True when the histogram has no entries.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterate `(feature, count)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> + '_ {
        self.counts.iter().map(|(f, c)| (f.as_str(), *c))
    }
}

impl FeatureSink for Histogram {
    fn register_drive(&mut self, _drive: &str) {}

    fn ingest(&mut self, _drive: &str, feature: &str, amount: u64) -> Result<()> {
        *self.counts.entry(feature.to_string()).or_insert(0) += amount;
        Ok(())
    }
}

/// Read a histogram member of a report.
///
/// Histograms are attributed to their report rather than a drive, so a
/// missing `Filename` banner is tolerated here.
pub fn read_histogram(source: &ReportSource, member: &str) -> Result<(Histogram, IngestReport)> {
    let options = IngestOptions::new()
        .mode(IngestMode::Histogram)
        .require_drive(false);
    source.open_member(member, |reader| {
        let mut histogram = Histogram::new();
        let report = ingest_stream(reader, member, &options, &mut histogram)?;
        Ok((histogram, report))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_read_histogram() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("email_histogram.txt"),
            "# Histogram-File-Version: 1.1\nn=10\tsteve@hotmail.com\nn=8\tsteve@mac.com\t(utf16=2)\nn=2\tsteve@hotmail.com\n",
        )
        .unwrap();
        let source = ReportSource::open(temp.path()).unwrap();

        let (histogram, report) = read_histogram(&source, "email_histogram.txt").unwrap();
        assert_eq!(histogram.len(), 2);
        assert_eq!(histogram.get("steve@hotmail.com"), 12);
        assert_eq!(histogram.get("steve@mac.com"), 8);
        assert_eq!(histogram.get("nobody@mac.com"), 0);
        assert!(report.malformed.is_empty());
    }
}
