//! Report sources: a bulk_extractor output directory or a zip of one.
//!
//! A [`ReportSource`] only remembers where the report lives and which members
//! it contains. Opening a member is stateless: every call to
//! [`ReportSource::open_member`] reopens the directory entry or archive, so
//! several threads can read different members of the same report at once.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use glob::Pattern;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::CdaError;
use crate::Result;

use super::lines::{self, trim_line_ending, FILENAME_PROPERTY, VERSION_PROPERTY};
use super::xml::ReportMetadata;

/// Name of the DFXML report written next to the feature files.
pub const REPORT_XML: &str = "report.xml";

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// How a report is stored on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportKind {
    /// An expanded output directory.
    Directory,
    /// A zip archive. `prefix` is the top-level directory shared by every
    /// entry (empty when entries sit at the archive root).
    Zip { prefix: String },
}

/// A bulk_extractor report opened for reading.
#[derive(Debug, Clone)]
pub struct ReportSource {
    path: PathBuf,
    kind: ReportKind,
    members: BTreeSet<String>,
}

impl ReportSource {
    /// Open a report directory or zip archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(CdaError::unreadable(path, "path does not exist"));
        }

        if path.is_dir() {
            let members = list_directory(path)?;
            return Ok(Self {
                path: path.to_path_buf(),
                kind: ReportKind::Directory,
                members,
            });
        }

        if !looks_like_zip(path)? {
            return Err(CdaError::unreadable(
                path,
                "not a report directory or zip archive",
            ));
        }

        let archive = open_archive(path)?;
        let names: Vec<String> = archive
            .file_names()
            .filter(|name| !name.ends_with('/'))
            .map(str::to_string)
            .collect();
        let prefix = common_prefix(&names);
        let members = names
            .iter()
            .map(|name| name[prefix.len()..].to_string())
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            kind: ReportKind::Zip { prefix },
            members,
        })
    }

    /// Path the report was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Short display name (the final path component).
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }

    /// Storage kind of this report.
    pub fn kind(&self) -> &ReportKind {
        &self.kind
    }

    /// All member names, relative to the report root.
    pub fn members(&self) -> &BTreeSet<String> {
        &self.members
    }

    /// Does the report contain this member?
    pub fn has_member(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    /// Member names matching a glob pattern, in sorted order.
    pub fn members_matching(&self, pattern: &str) -> Result<Vec<&str>> {
        let pat = Pattern::new(pattern).map_err(|e| CdaError::InvalidGlob {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        Ok(self
            .members
            .iter()
            .filter(|m| pat.matches(m))
            .map(String::as_str)
            .collect())
    }

    /// Histogram members (`*histogram*.txt`).
    pub fn histogram_files(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| is_text_member(m) && m.contains("histogram"))
            .map(String::as_str)
            .collect()
    }

    /// Feature file members: text members that are not histograms, tag
    /// files, wordlists or stop-list hits.
    pub fn feature_files(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| {
                is_text_member(m)
                    && !m.contains("histogram")
                    && !m.contains("wordlist")
                    && !m.ends_with("_tags.txt")
                    && !m.ends_with("_stopped.txt")
            })
            .map(String::as_str)
            .collect()
    }

    /// Open a member and hand a buffered reader to `f`.
    ///
    /// The member is released when `f` returns, whether it succeeded or not.
    pub fn open_member<T>(
        &self,
        member: &str,
        f: impl FnOnce(&mut dyn BufRead) -> Result<T>,
    ) -> Result<T> {
        if !self.has_member(member) {
            return Err(CdaError::unreadable(
                &self.path,
                format!("missing member '{member}'"),
            ));
        }

        match &self.kind {
            ReportKind::Directory => {
                let file = File::open(self.path.join(member)).map_err(|e| {
                    CdaError::unreadable(&self.path, format!("cannot open '{member}': {e}"))
                })?;
                let mut reader = BufReader::new(file);
                f(&mut reader)
            }
            ReportKind::Zip { prefix } => {
                let mut archive = open_archive(&self.path)?;
                let entry = archive.by_name(&format!("{prefix}{member}"))?;
                let mut reader = BufReader::new(entry);
                f(&mut reader)
            }
        }
    }

    /// Read a whole member into memory. Intended for small members such as
    /// `report.xml`.
    pub fn read_member(&self, member: &str) -> Result<Vec<u8>> {
        self.open_member(member, |reader| {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(buf)
        })
    }

    /// Parsed `report.xml`, if the report has one.
    pub fn metadata(&self) -> Result<Option<ReportMetadata>> {
        if !self.has_member(REPORT_XML) {
            return Ok(None);
        }
        let xml = self.read_member(REPORT_XML)?;
        ReportMetadata::parse(&xml, &self.path.join(REPORT_XML).to_string_lossy()).map(Some)
    }

    /// Path of the disk image this report was generated from.
    ///
    /// Taken from `report.xml`, falling back to the first `# Filename:`
    /// banner found in a feature file.
    pub fn image_file_path(&self) -> Result<Option<String>> {
        if let Some(meta) = self.metadata()? {
            if let Some(image) = meta.image_filename {
                return Ok(Some(image));
            }
        }
        self.banner_property(FILENAME_PROPERTY)
    }

    /// Version of the scanner that wrote this report.
    pub fn tool_version(&self) -> Result<Option<String>> {
        if let Some(meta) = self.metadata()? {
            if let Some(version) = meta.version {
                return Ok(Some(version));
            }
        }
        self.banner_property(VERSION_PROPERTY)
    }

    /// First value of a banner property across the feature files.
    fn banner_property(&self, key: &str) -> Result<Option<String>> {
        for member in self.feature_files() {
            let found = self.open_member(member, |reader| {
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf)? == 0 {
                        return Ok(None);
                    }
                    let Ok(line) = std::str::from_utf8(trim_line_ending(&buf)) else {
                        continue;
                    };
                    if !lines::is_comment_line(line) {
                        return Ok(None);
                    }
                    if let Some((k, v)) = lines::property_line(line) {
                        if k == key {
                            return Ok(Some(v.to_string()));
                        }
                    }
                }
            })?;
            if found.is_some() {
                return Ok(found);
            }
        }
        Ok(None)
    }
}

fn is_text_member(name: &str) -> bool {
    name.ends_with(".txt")
}

fn looks_like_zip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 4];
    let mut file =
        File::open(path).map_err(|e| CdaError::unreadable(path, format!("cannot open: {e}")))?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(&magic == ZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn open_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file =
        File::open(path).map_err(|e| CdaError::unreadable(path, format!("cannot open: {e}")))?;
    ZipArchive::new(file).map_err(|e| CdaError::unreadable(path, format!("bad zip archive: {e}")))
}

/// Top-level directory shared by every entry, including its trailing `/`.
fn common_prefix(names: &[String]) -> String {
    let Some(first) = names.first() else {
        return String::new();
    };
    let Some((dir, _)) = first.split_once('/') else {
        return String::new();
    };
    let prefix = format!("{dir}/");
    if names.iter().all(|n| n.starts_with(&prefix)) {
        prefix
    } else {
        String::new()
    }
}

/// Collect member names of a report directory, relative to its root.
fn list_directory(root: &Path) -> Result<BTreeSet<String>> {
    let mut members = BTreeSet::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| CdaError::unreadable(root, e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        members.insert(name);
    }

    Ok(members)
}
