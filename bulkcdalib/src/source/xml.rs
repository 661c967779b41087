//! `report.xml` metadata.
//!
//! bulk_extractor writes a DFXML document next to its feature files. Only a
//! handful of elements matter here:
//!
//! ```xml
//! <dfxml>
//!   <creator>
//!     <program>BULK_EXTRACTOR</program>
//!     <version>1.3</version>
//!   </creator>
//!   <source><image_filename>/images/disk1.raw</image_filename></source>
//!   <scanner_times>
//!     <path><name>email</name><calls>120</calls><seconds>3.5</seconds></path>
//!   </scanner_times>
//! </dfxml>
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::CdaError;
use crate::Result;

/// Time spent in one scanner path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerTime {
    /// Scanner path name (e.g. `email`, `zip-email`)
    pub name: String,
    /// Number of times the scanner was invoked
    pub calls: u64,
    /// Total wall-clock seconds
    pub seconds: f64,
}

/// Metadata extracted from `report.xml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Scanner version from `<creator><version>`
    pub version: Option<String>,
    /// Image path from `<image_filename>`
    pub image_filename: Option<String>,
    /// Per-path scanner timings, in document order
    pub scanner_times: Vec<ScannerTime>,
}

#[derive(Default)]
struct PathBuilder {
    name: Option<String>,
    calls: Option<u64>,
    seconds: Option<f64>,
}

impl ReportMetadata {
    /// Parse a `report.xml` document. `origin` names the document in errors.
    pub fn parse(xml: &[u8], origin: &str) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let xml_err = |message: String| CdaError::Xml {
            path: origin.to_string(),
            message,
        };

        let mut meta = ReportMetadata::default();
        let mut stack: Vec<String> = Vec::new();
        let mut current_path: Option<PathBuilder> = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if name == "path" && stack.last().map(String::as_str) == Some("scanner_times")
                    {
                        current_path = Some(PathBuilder::default());
                    }
                    stack.push(name);
                }
                Ok(Event::End(_)) => {
                    let closed = stack.pop();
                    if closed.as_deref() == Some("path") {
                        if let Some(builder) = current_path.take() {
                            if let Some(name) = builder.name {
                                meta.scanner_times.push(ScannerTime {
                                    name,
                                    calls: builder.calls.unwrap_or(0),
                                    seconds: builder.seconds.unwrap_or(0.0),
                                });
                            }
                        }
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| xml_err(e.to_string()))?
                        .to_string();
                    let element = stack.last().map(String::as_str);
                    let parent = stack.len().checked_sub(2).map(|i| stack[i].as_str());
                    match (parent, element) {
                        (Some("creator"), Some("version")) if meta.version.is_none() => {
                            meta.version = Some(text);
                        }
                        (_, Some("image_filename")) if meta.image_filename.is_none() => {
                            meta.image_filename = Some(text);
                        }
                        (Some("path"), Some(field)) => {
                            if let Some(builder) = current_path.as_mut() {
                                match field {
                                    "name" => builder.name = Some(text),
                                    "calls" => builder.calls = text.parse().ok(),
                                    "seconds" => builder.seconds = text.parse().ok(),
                                    _ => {}
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(xml_err(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
            buf.clear();
        }

        Ok(meta)
    }

    /// Sum of all scanner seconds.
    pub fn total_scanner_seconds(&self) -> f64 {
        self.scanner_times.iter().map(|t| t.seconds).sum()
    }
}
