//! One-report summaries: what ran, how long it took, and what it found.

use std::collections::HashSet;
use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::source::lines::{is_comment_line, trim_line_ending};
use crate::source::ReportSource;
use crate::Result;

use super::histogram::read_histogram;

/// Timing for one scanner path, with derived ratios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerRow {
    /// Scanner path name
    pub name: String,
    /// Invocations
    pub calls: u64,
    /// Total seconds
    pub seconds: f64,
    /// Seconds per call (0 when never called)
    pub per_call: f64,
    /// Share of the total scanner time, in percent
    pub percent: f64,
}

/// A histogram member and its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Member name
    pub name: String,
    /// Distinct features
    pub entries: usize,
    /// First non-comment line, usually the most frequent feature
    pub top: Option<String>,
}

/// A feature file member and its size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFileSummary {
    /// Member name
    pub name: String,
    /// Non-comment lines
    pub features: usize,
}

/// Summary of one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    /// Display name of the report
    pub name: String,
    /// Scanner version
    pub version: Option<String>,
    /// Image the report was made from
    pub image: Option<String>,
    /// Scanner timings, slowest first
    pub scanners: Vec<ScannerRow>,
    /// Sum of all scanner seconds
    pub total_seconds: f64,
    /// Histogram members, by name
    pub histograms: Vec<HistogramSummary>,
    /// Feature file members, by name
    pub feature_files: Vec<FeatureFileSummary>,
}

/// Summarise a report.
pub fn analyze_report(source: &ReportSource) -> Result<ReportSummary> {
    summarize(source, |_| true)
}

/// Summarise a report, listing only histogram and feature members whose
/// names match a glob pattern. Version, image and scanner times are kept.
pub fn analyze_matching(source: &ReportSource, pattern: &str) -> Result<ReportSummary> {
    let selected: HashSet<&str> = source.members_matching(pattern)?.into_iter().collect();
    summarize(source, |member| selected.contains(member))
}

fn summarize(source: &ReportSource, keep: impl Fn(&str) -> bool) -> Result<ReportSummary> {
    let metadata = source.metadata()?.unwrap_or_default();
    let total_seconds = metadata.total_scanner_seconds();

    let mut scanners: Vec<ScannerRow> = metadata
        .scanner_times
        .iter()
        .map(|t| ScannerRow {
            name: t.name.clone(),
            calls: t.calls,
            seconds: t.seconds,
            per_call: if t.calls == 0 { 0.0 } else { t.seconds / t.calls as f64 },
            percent: if total_seconds > 0.0 {
                100.0 * t.seconds / total_seconds
            } else {
                0.0
            },
        })
        .collect();
    scanners.sort_by(|a, b| b.seconds.total_cmp(&a.seconds).then_with(|| a.name.cmp(&b.name)));

    let mut histograms = Vec::new();
    for name in source.histogram_files().into_iter().filter(|n| keep(*n)) {
        let (histogram, _) = read_histogram(source, name)?;
        let top = source.open_member(name, first_data_line)?;
        histograms.push(HistogramSummary {
            name: name.to_string(),
            entries: histogram.len(),
            top,
        });
    }

    let mut feature_files = Vec::new();
    for name in source.feature_files().into_iter().filter(|n| keep(*n)) {
        let features = source.open_member(name, count_data_lines)?;
        feature_files.push(FeatureFileSummary {
            name: name.to_string(),
            features,
        });
    }

    Ok(ReportSummary {
        name: source.name(),
        version: source.tool_version()?,
        image: source.image_file_path()?,
        scanners,
        total_seconds,
        histograms,
        feature_files,
    })
}

fn first_data_line(reader: &mut dyn BufRead) -> Result<Option<String>> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        if !is_comment_line(&line) && !line.is_empty() {
            return Ok(Some(line.into_owned()));
        }
    }
}

fn count_data_lines(reader: &mut dyn BufRead) -> Result<usize> {
    let mut buf = Vec::new();
    let mut count = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(count);
        }
        let line = String::from_utf8_lossy(trim_line_ending(&buf));
        if !is_comment_line(&line) && !line.is_empty() {
            count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const REPORT_XML: &str = r#"<?xml version='1.0' encoding='UTF-8'?>
<dfxml>
  <creator>
    <program>BULK_EXTRACTOR</program>
    <version>1.4.0</version>
  </creator>
  <source><image_filename>/cases/disk1.raw</image_filename></source>
  <report>
    <scanner_times>
      <path><name>email</name><calls>4</calls><seconds>1.0</seconds></path>
      <path><name>zip</name><calls>2</calls><seconds>3.0</seconds></path>
    </scanner_times>
  </report>
</dfxml>
"#;

    #[test]
    fn test_analyze_report() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        fs::write(dir.join("report.xml"), REPORT_XML).unwrap();
        fs::write(
            dir.join("email_histogram.txt"),
            "\u{feff}# Histogram\nn=5\tbig@x.com\nn=1\tsmall@x.com\n",
        )
        .unwrap();
        fs::write(
            dir.join("email.txt"),
            "# Filename: /cases/disk1.raw\n0\ta@x.com\tctx\n10\tb@x.com\tctx\n\n",
        )
        .unwrap();

        let summary = analyze_report(&ReportSource::open(dir).unwrap()).unwrap();
        assert_eq!(summary.version.as_deref(), Some("1.4.0"));
        assert_eq!(summary.image.as_deref(), Some("/cases/disk1.raw"));
        assert_eq!(summary.total_seconds, 4.0);

        assert_eq!(summary.scanners[0].name, "zip");
        assert_eq!(summary.scanners[0].per_call, 1.5);
        assert_eq!(summary.scanners[0].percent, 75.0);
        assert_eq!(summary.scanners[1].name, "email");
        assert_eq!(summary.scanners[1].percent, 25.0);

        assert_eq!(summary.histograms.len(), 1);
        assert_eq!(summary.histograms[0].entries, 2);
        assert_eq!(summary.histograms[0].top.as_deref(), Some("n=5\tbig@x.com"));

        assert_eq!(summary.feature_files.len(), 1);
        assert_eq!(summary.feature_files[0].name, "email.txt");
        assert_eq!(summary.feature_files[0].features, 2);
    }

    #[test]
    fn test_analyze_matching_filters_members() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        fs::write(dir.join("report.xml"), REPORT_XML).unwrap();
        fs::write(dir.join("email_histogram.txt"), "n=5\tbig@x.com\n").unwrap();
        fs::write(dir.join("url_histogram.txt"), "n=2\thttp://x.com/\n").unwrap();
        fs::write(dir.join("email.txt"), "# Filename: d\n0\ta@x.com\tctx\n").unwrap();

        let source = ReportSource::open(dir).unwrap();
        let summary = analyze_matching(&source, "*histogram*").unwrap();
        let names: Vec<&str> = summary.histograms.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["email_histogram.txt", "url_histogram.txt"]);
        assert!(summary.feature_files.is_empty());
        assert_eq!(summary.scanners.len(), 2);

        let email = analyze_matching(&source, "email*").unwrap();
        assert_eq!(email.histograms.len(), 1);
        assert_eq!(email.feature_files.len(), 1);

        assert!(analyze_matching(&source, "[").is_err());
    }

    #[test]
    fn test_analyze_without_report_xml() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("ccn.txt"), "# only comments\n").unwrap();

        let summary = analyze_report(&ReportSource::open(temp.path()).unwrap()).unwrap();
        assert!(summary.version.is_none());
        assert!(summary.scanners.is_empty());
        assert_eq!(summary.total_seconds, 0.0);
        assert_eq!(summary.feature_files[0].features, 0);
    }
}
