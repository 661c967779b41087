//! Feature ingestion: turn a feature or histogram file into contributions.
//!
//! The ingestor reads one line at a time and pushes every
//! `(drive, feature, amount)` it finds into a [`FeatureSink`]. Nothing is
//! materialised, so memory use does not grow with the size of the report.
//!
//! ## Line handling
//!
//! | Line                         | Feature-file mode        | Histogram mode           |
//! |------------------------------|--------------------------|--------------------------|
//! | `# Filename: <image>`        | sets the current drive   | sets the current drive   |
//! | other `#` comments           | skipped                  | skipped                  |
//! | `n=<count>\t<feature>`       | skipped                  | `amount = count`         |
//! | `<offset>\t<feature>[\t...]` | `amount = 1`             | malformed                |
//! | not valid UTF-8              | decode warning, skipped  | decode warning, skipped  |
//!
//! A data line that arrives before any `Filename` header stops the file:
//! without a drive there is nothing to attribute the feature to. The rest of
//! the file is skipped and the reason is kept in [`IngestReport::failure`]
//! next to the diagnostics collected so far.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CdaError;
use crate::source::lines::{self, FILENAME_PROPERTY};
use crate::Result;

use super::index::FeatureSink;

/// Which grammar the data lines follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IngestMode {
    /// `<offset>\t<feature>[\t<context>]`, one occurrence per line
    #[default]
    FeatureFile,
    /// `n=<count>\t<feature>`, `count` occurrences per line
    Histogram,
}

/// Options controlling how a stream is ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOptions {
    /// Line grammar
    pub mode: IngestMode,
    /// Require exactly two tabs on feature lines
    pub strict: bool,
    /// Fail when data precedes the `Filename` header
    pub require_drive: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            mode: IngestMode::FeatureFile,
            strict: false,
            require_drive: true,
        }
    }
}

impl IngestOptions {
    /// Create default options (feature-file mode, lenient, header required).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the line grammar.
    pub fn mode(mut self, mode: IngestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable or disable strict tab-count validation.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Require (or not) a `Filename` header before data.
    pub fn require_drive(mut self, require: bool) -> Self {
        self.require_drive = require;
        self
    }
}

/// A line that could not be decoded as UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeWarning {
    /// Member the line came from
    pub file: String,
    /// 1-based line number
    pub line: usize,
}

/// A line that does not follow the expected grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedLine {
    /// Member the line came from
    pub file: String,
    /// 1-based line number
    pub line: usize,
    /// What was wrong with it
    pub reason: String,
}

/// Outcome of ingesting one stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    /// Member name
    pub file: String,
    /// Drives named by `Filename` headers, in order of appearance
    pub drives: Vec<String>,
    /// Lines read (including comments and skipped lines)
    pub lines: usize,
    /// Data lines that contributed to the sink
    pub contributions: usize,
    /// Lines that violated the grammar
    pub malformed: Vec<MalformedLine>,
    /// Lines that were not valid UTF-8
    pub decode_warnings: Vec<DecodeWarning>,
    /// Why reading stopped before the end of the stream, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<MalformedLine>,
}

impl IngestReport {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            ..Self::default()
        }
    }

    fn record_malformed(&mut self, line: usize, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(file = %self.file, line, %reason, "malformed line");
        self.malformed.push(MalformedLine {
            file: self.file.clone(),
            line,
            reason,
        });
    }

    /// Did the stream stop early?
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// The early stop as an error, for callers that report failures.
    pub fn failure_error(&self) -> Option<CdaError> {
        self.failure
            .as_ref()
            .map(|f| CdaError::malformed(&f.file, f.line, f.reason.clone()))
    }
}

/// Ingest a line stream into `sink`.
///
/// `file` names the stream in diagnostics. Per-line problems are recorded
/// in the returned report. A missing drive header (when required) stops the
/// stream and is recorded as the report's `failure`. Only a read error or an
/// error from the sink is returned as `Err`.
pub fn ingest_stream(
    reader: &mut dyn BufRead,
    file: &str,
    options: &IngestOptions,
    sink: &mut dyn FeatureSink,
) -> Result<IngestReport> {
    let mut report = IngestReport::new(file);
    let mut drive: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        report.lines += 1;
        let line_no = report.lines;

        let raw = lines::trim_line_ending(&buf);
        let Ok(text) = std::str::from_utf8(raw) else {
            debug!(file, line = line_no, "line is not valid UTF-8");
            report.decode_warnings.push(DecodeWarning {
                file: file.to_string(),
                line: line_no,
            });
            continue;
        };
        let text = if line_no == 1 {
            lines::strip_bom(text)
        } else {
            text
        };

        if lines::is_comment_line(text) {
            if let Some((key, value)) = lines::property_line(text) {
                if key == FILENAME_PROPERTY {
                    debug!(file, drive = value, "drive header");
                    sink.register_drive(value);
                    if !report.drives.iter().any(|d| d == value) {
                        report.drives.push(value.to_string());
                    }
                    drive = Some(value.to_string());
                }
            }
            continue;
        }

        if text.is_empty() {
            continue;
        }

        let parsed = match options.mode {
            IngestMode::FeatureFile => match lines::split_histogram_line(text) {
                Some(Ok(_)) => continue,
                Some(Err(count)) => Err(format!("histogram count '{count}' is not an integer")),
                None => parse_feature_line(text, options.strict),
            },
            IngestMode::Histogram => parse_histogram_line(text),
        };

        let (feature, amount) = match parsed {
            Ok(contribution) => contribution,
            Err(reason) => {
                report.record_malformed(line_no, reason);
                continue;
            }
        };

        let owner = match drive.as_deref() {
            Some(d) => d,
            None if options.require_drive => {
                let reason = "data line before the 'Filename' header";
                debug!(file, line = line_no, reason, "stopping");
                report.failure = Some(MalformedLine {
                    file: file.to_string(),
                    line: line_no,
                    reason: reason.to_string(),
                });
                break;
            }
            None => "",
        };

        sink.ingest(owner, feature, amount)?;
        report.contributions += 1;
    }

    Ok(report)
}

/// Parse `<offset>\t<feature>[\t<context>]`.
fn parse_feature_line(line: &str, strict: bool) -> std::result::Result<(&str, u64), String> {
    let tabs = lines::tab_count(line);
    if tabs == 0 {
        return Err("no tab delimiter".to_string());
    }
    if strict && tabs != 2 {
        return Err(format!("expected 2 tabs, found {tabs}"));
    }
    match line.split('\t').nth(1) {
        Some(feature) if !feature.is_empty() => Ok((feature, 1)),
        _ => Err("empty feature".to_string()),
    }
}

/// Parse `n=<count>\t<feature>[\t(utf16=<n>)]`.
fn parse_histogram_line(line: &str) -> std::result::Result<(&str, u64), String> {
    match lines::split_histogram_line(line) {
        None if line.starts_with("n=") => Err("no tab after count prefix".to_string()),
        None => Err("missing 'n=<count>' prefix".to_string()),
        Some(Err(text)) => Err(format!("count prefix '{text}' is not an integer")),
        Some(Ok((0, _))) => Err("zero count".to_string()),
        Some(Ok((_, ""))) => Err("empty feature".to_string()),
        Some(Ok((count, feature))) => Ok((feature, count)),
    }
}
