//! Report validation: every text line must be UTF-8, and in strict mode
//! every feature line must have exactly three columns.

use std::fmt::Write as _;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::source::lines::{is_comment_line, is_histogram_line, tab_count, trim_line_ending};
use crate::source::ReportSource;
use crate::Result;

/// What was wrong with a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineProblem {
    /// The line is not valid UTF-8. `bytes` is a hex dump of the raw line.
    InvalidUtf8 { line: usize, bytes: String },
    /// A feature line without exactly two tabs.
    InvalidFeatureLine { line: usize, text: String },
}

impl LineProblem {
    /// 1-based line number of the problem.
    pub fn line(&self) -> usize {
        match self {
            LineProblem::InvalidUtf8 { line, .. }
            | LineProblem::InvalidFeatureLine { line, .. } => *line,
        }
    }
}

/// Validation outcome for one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberValidation {
    /// Member name
    pub member: String,
    /// Lines read
    pub lines: usize,
    /// Problems found, in line order
    pub problems: Vec<LineProblem>,
}

/// Validation outcome for a whole report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Display name of the report
    pub name: String,
    /// Whether feature lines were checked for column count
    pub strict: bool,
    /// Checked members, by name
    pub members: Vec<MemberValidation>,
}

impl ValidationReport {
    /// Total problems across all members.
    pub fn problem_count(&self) -> usize {
        self.members.iter().map(|m| m.problems.len()).sum()
    }

    /// True when no member had a problem.
    pub fn is_valid(&self) -> bool {
        self.problem_count() == 0
    }
}

/// Members that are not line-oriented feature output.
fn is_checked_member(member: &str) -> bool {
    member.ends_with(".txt") && !member.ends_with("_tags.txt") && !member.contains("wordlist")
}

/// Validate every text member of a report.
pub fn validate_report(source: &ReportSource, strict: bool) -> Result<ValidationReport> {
    let selected: Vec<&str> = source.members().iter().map(String::as_str).collect();
    validate_selected(source, selected, strict)
}

/// Validate the text members whose names match a glob pattern such as
/// `email*`.
pub fn validate_matching(
    source: &ReportSource,
    pattern: &str,
    strict: bool,
) -> Result<ValidationReport> {
    let selected = source.members_matching(pattern)?;
    validate_selected(source, selected, strict)
}

fn validate_selected(
    source: &ReportSource,
    selected: Vec<&str>,
    strict: bool,
) -> Result<ValidationReport> {
    let mut members = Vec::new();
    for member in selected.into_iter().filter(|m| is_checked_member(m)) {
        info!(member = %member, "validating");
        let (lines, problems) =
            source.open_member(member, |reader| validate_stream(reader, strict))?;
        if !problems.is_empty() {
            warn!(member = %member, problems = problems.len(), "invalid lines");
        }
        members.push(MemberValidation {
            member: member.to_string(),
            lines,
            problems,
        });
    }

    Ok(ValidationReport {
        name: source.name(),
        strict,
        members,
    })
}

fn validate_stream(reader: &mut dyn BufRead, strict: bool) -> Result<(usize, Vec<LineProblem>)> {
    let mut problems = Vec::new();
    let mut buf = Vec::new();
    let mut line = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok((line, problems));
        }
        line += 1;

        let raw = trim_line_ending(&buf);
        let Ok(text) = std::str::from_utf8(raw) else {
            problems.push(LineProblem::InvalidUtf8 {
                line,
                bytes: hex_dump(raw),
            });
            continue;
        };

        if !strict || text.is_empty() || is_comment_line(text) || is_histogram_line(text) {
            continue;
        }
        if tab_count(text) != 2 {
            problems.push(LineProblem::InvalidFeatureLine {
                line,
                text: text.to_string(),
            });
        }
    }
}

/// Hex bytes in groups of six.
fn hex_dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
            if i % 6 == 0 {
                out.push(' ');
            }
        }
        let _ = write!(out, "{b:02x}");
    }
    out
}
