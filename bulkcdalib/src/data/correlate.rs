//! High-level correlation API.
//!
//! [`correlate`] builds one [`CorrelatorIndex`] per requested category from
//! a set of report sources and records everything that went wrong along the
//! way in a [`RunReport`].
//!
//! Categories are independent, so each one is ingested on its own rayon
//! task. Within a category the sources are ingested one after another: the
//! index has a single writer.

use std::collections::BTreeSet;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::CdaError;
use crate::source::ReportSource;
use crate::Result;

use super::index::CorrelatorIndex;
use super::ingest::{ingest_stream, IngestMode, IngestOptions, IngestReport};

/// Categories correlated when none are given.
pub const DEFAULT_CATEGORIES: &[&str] = &["email", "ccn", "telephone"];

/// Default fraction of drives a feature must reach to be stoplisted.
pub const DEFAULT_THRESHOLD: f64 = 0.667;

/// Options for a correlation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelateOptions {
    /// Feature categories to correlate (one index each)
    pub categories: Vec<String>,
    /// Fraction of drives for the stoplist threshold
    pub threshold: f64,
    /// Read `<category>_histogram.txt` instead of `<category>.txt`
    pub use_histograms: bool,
    /// Strict feature-line validation
    pub strict: bool,
    /// Ingest categories on parallel worker threads
    pub parallel: bool,
}

impl Default for CorrelateOptions {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            threshold: DEFAULT_THRESHOLD,
            use_histograms: false,
            strict: false,
            parallel: true,
        }
    }
}

impl CorrelateOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the categories to correlate.
    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    /// Set categories from a comma-separated list such as `email,ccn`.
    pub fn category_list(self, list: &str) -> Result<Self> {
        let categories: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if categories.is_empty() {
            return Err(CdaError::InvalidArgument(format!(
                "no feature categories in '{list}'"
            )));
        }
        Ok(self.categories(categories))
    }

    /// Set the stoplist threshold.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Ingest histogram members instead of feature files.
    pub fn use_histograms(mut self, yes: bool) -> Self {
        self.use_histograms = yes;
        self
    }

    /// Enable strict feature-line validation.
    pub fn strict(mut self, yes: bool) -> Self {
        self.strict = yes;
        self
    }

    /// Enable or disable parallel category ingestion.
    pub fn parallel(mut self, yes: bool) -> Self {
        self.parallel = yes;
        self
    }

    /// Check the options before any report is read.
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || !(0.0..=1.0).contains(&self.threshold) {
            return Err(CdaError::InvalidArgument(format!(
                "threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }
        if self.categories.is_empty() {
            return Err(CdaError::InvalidArgument(
                "at least one feature category is required".to_string(),
            ));
        }
        let mut seen = BTreeSet::new();
        for category in &self.categories {
            if category.is_empty() || category.contains(['/', '\\']) {
                return Err(CdaError::InvalidArgument(format!(
                    "invalid feature category '{category}'"
                )));
            }
            if !seen.insert(category.as_str()) {
                return Err(CdaError::InvalidArgument(format!(
                    "feature category '{category}' given twice"
                )));
            }
        }
        Ok(())
    }

    /// Report member holding a category's data.
    pub fn member_for(&self, category: &str) -> String {
        if self.use_histograms {
            format!("{category}_histogram.txt")
        } else {
            format!("{category}.txt")
        }
    }

    fn ingest_options(&self) -> IngestOptions {
        let mode = if self.use_histograms {
            IngestMode::Histogram
        } else {
            IngestMode::FeatureFile
        };
        IngestOptions::new().mode(mode).strict(self.strict)
    }
}

/// What happened to one source for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    /// Member that failed
    pub member: String,
    /// Error message
    pub message: String,
}

/// Per-source outcome of a correlation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    /// Report path
    pub path: PathBuf,
    /// Drives named by this source's files
    pub drives: Vec<String>,
    /// One entry per member ingested
    pub files: Vec<IngestReport>,
    /// Category members the report does not contain
    pub missing_members: Vec<String>,
    /// Members whose ingestion stopped early
    pub failures: Vec<FileFailure>,
}

impl SourceReport {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// Malformed lines across all of this source's files.
    pub fn malformed_lines(&self) -> usize {
        self.files.iter().map(|f| f.malformed.len()).sum()
    }

    /// Undecodable lines across all of this source's files.
    pub fn decode_warnings(&self) -> usize {
        self.files.iter().map(|f| f.decode_warnings.len()).sum()
    }

    fn absorb(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Ingested(report) => {
                for drive in &report.drives {
                    if !self.drives.contains(drive) {
                        self.drives.push(drive.clone());
                    }
                }
                if let Some(error) = report.failure_error() {
                    self.failures.push(FileFailure {
                        member: report.file.clone(),
                        message: error.to_string(),
                    });
                }
                self.files.push(report);
            }
            Outcome::Missing(member) => self.missing_members.push(member),
            Outcome::Failed(failure) => self.failures.push(failure),
        }
    }
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Distinct drives seen across all categories
    pub drives_processed: usize,
    /// Per-source details, in the order sources were given
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Malformed lines across the run.
    pub fn malformed_lines(&self) -> usize {
        self.sources.iter().map(SourceReport::malformed_lines).sum()
    }

    /// Undecodable lines across the run.
    pub fn decode_warnings(&self) -> usize {
        self.sources.iter().map(SourceReport::decode_warnings).sum()
    }

    /// Files whose ingestion stopped early.
    pub fn failures(&self) -> usize {
        self.sources.iter().map(|s| s.failures.len()).sum()
    }
}

/// Result of correlating a set of reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// One index per category, in the order categories were requested
    pub indices: Vec<CorrelatorIndex>,
    /// Number of report sources supplied (the stoplist denominator)
    pub total_drive_count: usize,
    /// Diagnostics collected during ingestion
    pub report: RunReport,
}

impl CorrelationResult {
    /// Index for a category.
    pub fn index(&self, category: &str) -> Option<&CorrelatorIndex> {
        self.indices.iter().find(|i| i.category() == category)
    }

    /// Every drive seen in any category, sorted.
    pub fn drives(&self) -> BTreeSet<String> {
        all_drives(&self.indices)
    }
}

/// Sorted union of the drive sets of several indices.
pub fn all_drives(indices: &[CorrelatorIndex]) -> BTreeSet<String> {
    indices
        .iter()
        .flat_map(|i| i.drives().iter().cloned())
        .collect()
}

enum Outcome {
    Ingested(IngestReport),
    Missing(String),
    Failed(FileFailure),
}

/// Correlate features across report sources.
///
/// Each source contributes its `<category>.txt` (or histogram) member to
/// the category's index. Missing members and files that fail part-way are
/// recorded and skipped; what was ingested before a failure stays in the
/// index, and so do the diagnostics collected before it. Only an invariant
/// violation aborts the run.
///
/// # Example
///
/// ```rust
/// use bulkcdalib::{correlate, CorrelateOptions, ReportSource};
/// use std::fs;
/// use tempfile::tempdir;
///
/// let dir = tempdir().unwrap();
/// fs::write(
///     dir.path().join("email.txt"),
///     "# Filename: disk1.raw\n512\talice@x.com\tctx\n",
/// )
/// .unwrap();
///
/// let sources = vec![ReportSource::open(dir.path()).unwrap()];
/// let options = CorrelateOptions::new().categories(vec!["email".to_string()]);
/// let result = correlate(&sources, &options).unwrap();
///
/// assert_eq!(result.index("email").unwrap().drive_count_for("alice@x.com"), 1);
/// assert_eq!(result.report.drives_processed, 1);
/// ```
pub fn correlate(
    sources: &[ReportSource],
    options: &CorrelateOptions,
) -> Result<CorrelationResult> {
    options.validate()?;

    let per_category: Vec<(CorrelatorIndex, Vec<Outcome>)> = if options.parallel {
        options
            .categories
            .par_iter()
            .map(|category| ingest_category(category, sources, options))
            .collect::<Result<_>>()?
    } else {
        options
            .categories
            .iter()
            .map(|category| ingest_category(category, sources, options))
            .collect::<Result<_>>()?
    };

    let mut source_reports: Vec<SourceReport> = sources
        .iter()
        .map(|s| SourceReport::new(s.path().to_path_buf()))
        .collect();
    let mut indices = Vec::with_capacity(per_category.len());

    for (index, outcomes) in per_category {
        for (report, outcome) in source_reports.iter_mut().zip(outcomes) {
            report.absorb(outcome);
        }
        indices.push(index);
    }

    let report = RunReport {
        drives_processed: all_drives(&indices).len(),
        sources: source_reports,
    };

    Ok(CorrelationResult {
        indices,
        total_drive_count: sources.len(),
        report,
    })
}

/// Build one category's index, visiting sources in order.
fn ingest_category(
    category: &str,
    sources: &[ReportSource],
    options: &CorrelateOptions,
) -> Result<(CorrelatorIndex, Vec<Outcome>)> {
    let member = options.member_for(category);
    let ingest_options = options.ingest_options();
    let mut index = CorrelatorIndex::new(category);
    let mut outcomes = Vec::with_capacity(sources.len());

    for source in sources {
        if !source.has_member(&member) {
            warn!(report = %source.path().display(), %member, "member not found");
            outcomes.push(Outcome::Missing(member.clone()));
            continue;
        }

        info!("scanning {} for {}", source.path().display(), category);
        let result = source.open_member(&member, |reader| {
            ingest_stream(reader, &member, &ingest_options, &mut index)
        });

        match result {
            Ok(report) => {
                if !report.malformed.is_empty() || !report.decode_warnings.is_empty() {
                    warn!(
                        report = %source.path().display(),
                        %member,
                        malformed = report.malformed.len(),
                        undecodable = report.decode_warnings.len(),
                        "skipped lines"
                    );
                }
                if let Some(failure) = &report.failure {
                    warn!(
                        report = %source.path().display(),
                        %member,
                        line = failure.line,
                        reason = %failure.reason,
                        "ingestion stopped"
                    );
                }
                outcomes.push(Outcome::Ingested(report));
            }
            Err(e @ CdaError::InvariantViolation(_)) => return Err(e),
            Err(e) => {
                warn!(report = %source.path().display(), %member, error = %e, "ingestion stopped");
                outcomes.push(Outcome::Failed(FileFailure {
                    member: member.clone(),
                    message: e.to_string(),
                }));
            }
        }
    }

    Ok((index, outcomes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::{tempdir, TempDir};

    fn write_member(root: &Path, name: &str, drive: &str, features: &[&str]) {
        let mut content = format!("# Feature-Recorder: x\n# Filename: {drive}\n");
        for (i, feature) in features.iter().enumerate() {
            content.push_str(&format!("{}\t{}\tctx\n", i * 512, feature));
        }
        fs::create_dir_all(root).unwrap();
        fs::write(root.join(name), content).unwrap();
    }

    fn corpus() -> (TempDir, Vec<ReportSource>) {
        let temp = tempdir().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        let c = temp.path().join("c");
        write_member(&a, "email.txt", "A", &["alice@x.com", "alice@x.com", "carol@x.com"]);
        write_member(&a, "ccn.txt", "A", &["4111111111111111"]);
        write_member(&b, "email.txt", "B", &["alice@x.com", "bob@x.com"]);
        write_member(&c, "email.txt", "C", &["alice@x.com"]);
        fs::write(c.join("ccn.txt"), "4111111111111111\tno header\n").unwrap();
        let sources = [a, b, c]
            .iter()
            .map(|p| ReportSource::open(p).unwrap())
            .collect();
        (temp, sources)
    }

    fn options() -> CorrelateOptions {
        CorrelateOptions::new().categories(vec!["email".to_string(), "ccn".to_string()])
    }

    #[test]
    fn test_correlate_builds_one_index_per_category() {
        let (_temp, sources) = corpus();
        let result = correlate(&sources, &options()).unwrap();

        assert_eq!(result.indices.len(), 2);
        assert_eq!(result.total_drive_count, 3);
        let email = result.index("email").unwrap();
        assert_eq!(email.drive_count_for("alice@x.com"), 3);
        assert_eq!(email.count("alice@x.com", "A"), 2);
        assert_eq!(result.index("ccn").unwrap().drive_count_for("4111111111111111"), 1);
    }

    #[test]
    fn test_failures_are_recorded_per_source() {
        let (_temp, sources) = corpus();
        let result = correlate(&sources, &options()).unwrap();
        let report = &result.report;

        assert_eq!(report.drives_processed, 3);
        assert_eq!(report.sources[1].missing_members, vec!["ccn.txt"]);
        assert_eq!(report.sources[2].failures.len(), 1);
        assert_eq!(report.sources[2].failures[0].member, "ccn.txt");
        assert_eq!(report.failures(), 1);
        assert_eq!(report.sources[0].drives, vec!["A"]);
    }

    #[test]
    fn test_failed_file_keeps_diagnostics_and_later_sources_run() {
        let temp = tempdir().unwrap();
        let broken = temp.path().join("broken");
        let healthy = temp.path().join("healthy");
        fs::create_dir_all(&broken).unwrap();
        fs::write(
            broken.join("email.txt"),
            "garbage\nmore garbage\n512\tx@y.com\tctx\n",
        )
        .unwrap();
        write_member(&healthy, "email.txt", "H", &["x@y.com", "ok@y.com"]);
        let sources = vec![
            ReportSource::open(&broken).unwrap(),
            ReportSource::open(&healthy).unwrap(),
        ];

        let options = CorrelateOptions::new().categories(vec!["email".to_string()]);
        let result = correlate(&sources, &options).unwrap();
        let report = &result.report;

        assert_eq!(report.sources[0].malformed_lines(), 2);
        assert_eq!(report.sources[0].failures.len(), 1);
        assert!(report.sources[0].failures[0].message.contains("email.txt:3"));
        assert_eq!(report.malformed_lines(), 2);
        assert_eq!(report.failures(), 1);

        assert!(report.sources[1].failures.is_empty());
        let email = result.index("email").unwrap();
        assert_eq!(email.count("x@y.com", "H"), 1);
        assert_eq!(email.count("ok@y.com", "H"), 1);
        assert_eq!(report.drives_processed, 1);
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let (_temp, sources) = corpus();
        let parallel = correlate(&sources, &options()).unwrap();
        let sequential = correlate(&sources, &options().parallel(false)).unwrap();
        assert_eq!(parallel.indices, sequential.indices);
        assert_eq!(parallel.report, sequential.report);
    }

    #[test]
    fn test_histogram_members() {
        let temp = tempdir().unwrap();
        fs::write(
            temp.path().join("email_histogram.txt"),
            "# Filename: driveX\nn=42\tfoo@bar.com\n",
        )
        .unwrap();
        let sources = vec![ReportSource::open(temp.path()).unwrap()];
        let options = CorrelateOptions::new()
            .categories(vec!["email".to_string()])
            .use_histograms(true);
        let result = correlate(&sources, &options).unwrap();
        assert_eq!(result.index("email").unwrap().count("foo@bar.com", "driveX"), 42);
    }

    #[test]
    fn test_option_validation() {
        assert!(CorrelateOptions::new().validate().is_ok());
        assert!(CorrelateOptions::new().threshold(1.5).validate().is_err());
        assert!(CorrelateOptions::new().threshold(f64::NAN).validate().is_err());
        assert!(CorrelateOptions::new().categories(vec![]).validate().is_err());
        assert!(CorrelateOptions::new()
            .categories(vec!["email".into(), "email".into()])
            .validate()
            .is_err());
        assert!(CorrelateOptions::new()
            .categories(vec!["../etc".into()])
            .validate()
            .is_err());
    }

    #[test]
    fn test_category_list() {
        let options = CorrelateOptions::new().category_list("email, ccn,,").unwrap();
        assert_eq!(options.categories, vec!["email", "ccn"]);
        assert!(CorrelateOptions::new().category_list(" , ").is_err());
    }

    #[test]
    fn test_member_for() {
        let options = CorrelateOptions::new();
        assert_eq!(options.member_for("email"), "email.txt");
        assert_eq!(
            options.use_histograms(true).member_for("email"),
            "email_histogram.txt"
        );
    }
}
