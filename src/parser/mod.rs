//! Manuscript parsing module.
//!
//! Raw bytes in a supported container format become a [`Document`]. Each
//! source reader lowers its format to raw blocks; one shared assembly pass
//! then detects the title, authors, sections and captions, so every format
//! follows the same structural rules.

mod assemble;
mod classify;
pub(crate) mod docx;
pub(crate) mod json;
mod markdown;
mod options;
mod text;

pub(crate) use assemble::{parse_reference_line, split_keywords, strip_caption_label};
pub use classify::{classify_heading, strip_numbering, strip_subsection_numbering, Classification};
pub use options::{ErrorMode, ParseOptions};

use crate::detect::{detect_format_from_bytes, SourceFormat};
use crate::error::{ParseError, Result};
use crate::model::Document;
use log::info;
use std::io::Read;
use std::path::Path;

const UTF8_BOM: &str = "\u{feff}";

/// Manuscript parser.
pub struct ManuscriptParser {
    data: Vec<u8>,
    format: SourceFormat,
    options: ParseOptions,
}

impl ManuscriptParser {
    /// Open a manuscript file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ParseOptions::default())
    }

    /// Open a manuscript file with custom options.
    ///
    /// The file extension declares the format unless the options already do.
    pub fn open_with_options<P: AsRef<Path>>(path: P, mut options: ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        if options.format.is_none() {
            options.format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(SourceFormat::from_extension);
        }
        let data = std::fs::read(path)?;
        Self::from_bytes_with_options(&data, options)
    }

    /// Create a parser over raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ParseOptions::default())
    }

    /// Create a parser over raw bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<Self> {
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::EmptyDocument.into());
        }
        let format = match options.format {
            Some(format) => format,
            None => detect_format_from_bytes(data)?,
        };
        Ok(Self {
            data: data.to_vec(),
            format,
            options,
        })
    }

    /// Create a parser from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ParseOptions::default())
    }

    /// Create a parser from a reader with custom options.
    pub fn from_reader_with_options<R: Read>(mut reader: R, options: ParseOptions) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes_with_options(&data, options)
    }

    /// Source format being parsed.
    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Parse the input into a document.
    pub fn parse(&self) -> Result<Document> {
        let doc = match self.format {
            SourceFormat::Json => json::read_json(&self.data, &self.options)?,
            SourceFormat::Docx => {
                let raw = docx::read_docx(&self.data, &self.options)?;
                assemble::assemble(raw, &self.options)?
            }
            SourceFormat::Markdown => {
                let raw = markdown::read_markdown(self.text()?, &self.options);
                assemble::assemble(raw, &self.options)?
            }
            SourceFormat::Text => {
                let raw = text::read_text(self.text()?);
                assemble::assemble(raw, &self.options)?
            }
        };

        info!(
            "Parsed {} input: {} sections, {} references",
            self.format,
            doc.section_count(),
            doc.bibliography.len()
        );
        Ok(doc)
    }

    fn text(&self) -> std::result::Result<&str, ParseError> {
        let text = std::str::from_utf8(&self.data).map_err(|e| {
            ParseError::CorruptStructure(format!("{} input is not valid UTF-8: {}", self.format, e))
        })?;
        Ok(text.strip_prefix(UTF8_BOM).unwrap_or(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::SectionType;

    #[test]
    fn test_parse_markdown_bytes() {
        let md = b"# A Paper\n\nJane Roe\n\n## Abstract\n\nWe study.\n\n## Introduction\n\nHello [1].\n\n## References\n\n[1] Roe, J. Things. 2021.\n";
        let doc = ManuscriptParser::from_bytes(md).unwrap().parse().unwrap();
        assert_eq!(doc.metadata.title.as_deref(), Some("A Paper"));
        assert_eq!(doc.metadata.authors, vec!["Jane Roe"]);
        let kinds: Vec<SectionType> = doc.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionType::Abstract,
                SectionType::Introduction,
                SectionType::References
            ]
        );
        assert_eq!(doc.bibliography.len(), 1);
        assert_eq!(doc.metadata.source_format.as_deref(), Some("markdown"));
    }

    #[test]
    fn test_declared_format_wins() {
        let parser = ManuscriptParser::from_bytes_with_options(
            b"# Not markdown here",
            ParseOptions::new().with_format(SourceFormat::Text),
        )
        .unwrap();
        assert_eq!(parser.format(), SourceFormat::Text);
    }

    #[test]
    fn test_empty_input() {
        let result = ManuscriptParser::from_bytes(b"  \n\t ");
        assert!(matches!(result, Err(Error::Parse(ParseError::EmptyDocument))));
    }

    #[test]
    fn test_invalid_utf8_declared_text() {
        let parser = ManuscriptParser::from_bytes_with_options(
            &[0x41, 0xff, 0x42],
            ParseOptions::new().with_format(SourceFormat::Text),
        )
        .unwrap();
        assert!(matches!(
            parser.parse(),
            Err(Error::Parse(ParseError::CorruptStructure(_)))
        ));
    }

    #[test]
    fn test_open_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paper.txt");
        std::fs::write(&path, "Title\n\nIntroduction\nHello.").unwrap();
        let parser = ManuscriptParser::open(&path).unwrap();
        assert_eq!(parser.format(), SourceFormat::Text);
        let doc = parser.parse().unwrap();
        assert_eq!(doc.sections[0].kind, SectionType::Introduction);
    }
}
