//! Source format detection.

use crate::error::{ParseError, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Supported input container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Canonical JSON document
    Json,
    /// Markdown
    Markdown,
    /// Plain text
    Text,
    /// Office Open XML word processing document
    Docx,
}

impl SourceFormat {
    /// Short name ("json", "markdown", ...).
    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::Markdown => "markdown",
            SourceFormat::Text => "text",
            SourceFormat::Docx => "docx",
        }
    }

    /// Format implied by a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(SourceFormat::Json),
            "md" | "markdown" => Some(SourceFormat::Markdown),
            "txt" | "text" => Some(SourceFormat::Text),
            "docx" => Some(SourceFormat::Docx),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ZIP local file header.
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
/// OLE compound file (legacy .doc).
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const PDF_MAGIC: &[u8] = b"%PDF-";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
/// Bytes inspected for text sniffing.
const SNIFF_LEN: usize = 8192;

/// Detect the source format from a file path.
///
/// The extension decides when it is known; otherwise the header bytes are
/// sniffed.
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<SourceFormat> {
    let path = path.as_ref();
    if let Some(format) = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(SourceFormat::from_extension)
    {
        return Ok(format);
    }

    let file = File::open(path)?;
    let mut header = Vec::with_capacity(SNIFF_LEN);
    BufReader::new(file)
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(detect_format_from_bytes(&header)?)
}

/// Detect the source format from leading bytes.
pub fn detect_format_from_bytes(data: &[u8]) -> std::result::Result<SourceFormat, ParseError> {
    if data.starts_with(ZIP_MAGIC) {
        return Ok(SourceFormat::Docx);
    }
    if data.starts_with(OLE_MAGIC) {
        return Err(ParseError::UnsupportedFormat(
            "legacy binary .doc files are not supported".to_string(),
        ));
    }
    if data.starts_with(PDF_MAGIC) {
        return Err(ParseError::UnsupportedFormat("PDF input".to_string()));
    }

    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let sample = &data[..data.len().min(SNIFF_LEN)];
    let text = match std::str::from_utf8(sample) {
        Ok(text) => text,
        // The sample may cut a multi-byte character in half
        Err(e) if e.valid_up_to() + 4 > sample.len() && e.error_len().is_none() => {
            std::str::from_utf8(&sample[..e.valid_up_to()]).unwrap_or("")
        }
        Err(_) => {
            return Err(ParseError::UnsupportedFormat(
                "binary data that is not a DOCX container".to_string(),
            ))
        }
    };
    if text.contains('\0') {
        return Err(ParseError::UnsupportedFormat("binary data".to_string()));
    }

    if text.trim_start().starts_with('{') {
        return Ok(SourceFormat::Json);
    }
    if looks_like_markdown(text) {
        return Ok(SourceFormat::Markdown);
    }
    Ok(SourceFormat::Text)
}

/// Check whether bytes are a ZIP (DOCX) container.
pub fn is_docx_bytes(data: &[u8]) -> bool {
    data.starts_with(ZIP_MAGIC)
}

fn looks_like_markdown(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim_start();
        let hashes = line.chars().take_while(|c| *c == '#').count();
        (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
            || line.starts_with("![")
            || line.starts_with("$$")
            || (line.starts_with('|') && line.ends_with('|') && line.len() > 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_docx() {
        let data = b"PK\x03\x04\x14\x00\x06\x00";
        assert_eq!(detect_format_from_bytes(data), Ok(SourceFormat::Docx));
        assert!(is_docx_bytes(data));
    }

    #[test]
    fn test_detect_json() {
        let data = b"  \n{\"format\":\"ieeefmt\"}";
        assert_eq!(detect_format_from_bytes(data), Ok(SourceFormat::Json));
    }

    #[test]
    fn test_detect_markdown_and_text() {
        assert_eq!(
            detect_format_from_bytes(b"Title\n\n# Introduction\nBody"),
            Ok(SourceFormat::Markdown)
        );
        assert_eq!(
            detect_format_from_bytes(b"\xEF\xBB\xBFTitle\n\nIntroduction\nBody"),
            Ok(SourceFormat::Text)
        );
        assert_eq!(
            detect_format_from_bytes(b"#hashtag is not a heading"),
            Ok(SourceFormat::Text)
        );
    }

    #[test]
    fn test_detect_unsupported() {
        assert!(matches!(
            detect_format_from_bytes(b"%PDF-1.7\n"),
            Err(ParseError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            detect_format_from_bytes(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1\x00"),
            Err(ParseError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            detect_format_from_bytes(&[0xff, 0xfe, 0x00, 0x41]),
            Err(ParseError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(SourceFormat::from_extension("MD"), Some(SourceFormat::Markdown));
        assert_eq!(SourceFormat::from_extension("docx"), Some(SourceFormat::Docx));
        assert_eq!(SourceFormat::from_extension("pdf"), None);
    }
}
