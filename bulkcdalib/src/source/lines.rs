//! Line classification for bulk_extractor feature and histogram files.
//!
//! Every report member is a UTF-8 text file made of three kinds of lines:
//!
//! - **Comments**: lines starting with `#`. Some comments are *property lines*
//!   of the form `# Key: value` (for example `# Filename: /images/disk1.raw`).
//! - **Histogram lines**: `n=<count>\t<feature>[\t(utf16=<n>)]`
//! - **Feature lines**: `<offset>\t<feature>[\t<context>]`
//!
//! The first line of a file written by the scanner starts with a UTF-8 byte
//! order mark, which is not part of the content.

/// UTF-8 byte order mark as it appears at the start of decoded text.
pub const BOM: char = '\u{feff}';

/// Property key naming the image a file was generated from.
pub const FILENAME_PROPERTY: &str = "Filename";

/// Property key carrying the scanner version.
pub const VERSION_PROPERTY: &str = "BULK_EXTRACTOR-Version";

/// Remove a leading byte order mark, if any.
pub fn strip_bom(line: &str) -> &str {
    line.strip_prefix(BOM).unwrap_or(line)
}

/// Remove a trailing `\n` or `\r\n` from a raw line.
pub fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Is this a comment line?
pub fn is_comment_line(line: &str) -> bool {
    strip_bom(line).starts_with('#')
}

/// Is this a histogram line (`n=<digits>` followed by a tab)?
pub fn is_histogram_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("n=") else {
        return false;
    };
    let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
    digits > 0 && rest.as_bytes().get(digits) == Some(&b'\t')
}

/// Parse a `# Key: value` property line into `(key, value)`.
///
/// Keys are restricted to ASCII alphanumerics, `-` and `_`, matching what
/// the scanner writes in its file banners.
pub fn property_line(line: &str) -> Option<(&str, &str)> {
    let body = strip_bom(line).strip_prefix("# ")?;
    let (key, value) = body.split_once(": ")?;
    if key.is_empty()
        || !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }
    Some((key, value.trim_end()))
}

/// Split a histogram line into its count and feature.
///
/// Returns `None` when the line is not a histogram line. Returns
/// `Some(Err(text))` when the count prefix is present but is not a valid
/// integer, with the offending text.
pub fn split_histogram_line(line: &str) -> Option<Result<(u64, &str), &str>> {
    let rest = line.strip_prefix("n=")?;
    let mut fields = rest.split('\t');
    let count_text = fields.next().unwrap_or_default();
    let feature = fields.next()?;
    Some(
        count_text
            .parse::<u64>()
            .map(|count| (count, feature))
            .map_err(|_| count_text),
    )
}

/// Number of tab characters in a line.
pub fn tab_count(line: &str) -> usize {
    line.bytes().filter(|&b| b == b'\t').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_lines() {
        assert!(is_comment_line("# Feature-Recorder: email"));
        assert!(is_comment_line("\u{feff}# BANNER FILE NOT PROVIDED"));
        assert!(!is_comment_line("1024\tfoo@bar.com\tctx"));
        assert!(!is_comment_line(""));
    }

    #[test]
    fn test_histogram_lines() {
        assert!(is_histogram_line("n=42\tfoo@bar.com"));
        assert!(is_histogram_line("n=1\tx\t(utf16=1)"));
        assert!(!is_histogram_line("n=\tfoo"));
        assert!(!is_histogram_line("n=4x\tfoo"));
        assert!(!is_histogram_line("512\tn=4"));
    }

    #[test]
    fn test_property_line() {
        assert_eq!(
            property_line("# Filename: /corp/drives/disk1.raw"),
            Some(("Filename", "/corp/drives/disk1.raw"))
        );
        assert_eq!(
            property_line("\u{feff}# BULK_EXTRACTOR-Version: 1.3b1"),
            Some(("BULK_EXTRACTOR-Version", "1.3b1"))
        );
        assert_eq!(property_line("# just a comment"), None);
        assert_eq!(property_line("# two words: nope"), None);
        assert_eq!(property_line("Filename: x"), None);
    }

    #[test]
    fn test_split_histogram_line() {
        assert_eq!(
            split_histogram_line("n=42\tfoo@bar.com"),
            Some(Ok((42, "foo@bar.com")))
        );
        assert_eq!(
            split_histogram_line("n=3\tfoo@bar.com\t(utf16=3)"),
            Some(Ok((3, "foo@bar.com")))
        );
        assert_eq!(split_histogram_line("n=abc\tfoo"), Some(Err("abc")));
        assert_eq!(split_histogram_line("n=5"), None);
        assert_eq!(split_histogram_line("5\tfoo"), None);
    }

    #[test]
    fn test_trim_line_ending() {
        assert_eq!(trim_line_ending(b"abc\r\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc\n"), b"abc");
        assert_eq!(trim_line_ending(b"abc"), b"abc");
    }

    #[test]
    fn test_tab_count() {
        assert_eq!(tab_count("0\tfoo\tbar"), 2);
        assert_eq!(tab_count("garbage"), 0);
    }
}
