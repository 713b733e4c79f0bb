//! Document export.
//!
//! [`ExportFormat::Json`] is the canonical, lossless format: parsing its
//! output gives back an equivalent document. The other formats are
//! renderings and drop what they cannot express:
//!
//! | format | dropped |
//! |---|---|
//! | Markdown | fonts, spacing, page layout, section types and confidence |
//! | Text | everything but text |
//! | Docx | section types and confidence, original headings, image data |
//! | Pdf | section types and confidence, original headings, image data, paragraph spacing and alignment; equations are set as source text |
//!
//! PDF output needs the `pdf` feature; without it the format parses but
//! export fails with [`ExportError::FeatureRequired`].

mod docx;
mod json;
mod markdown;
mod options;
mod pdf;
mod text;

pub use options::{ExportFormat, ExportOptions};
pub use pdf::to_typst;

use crate::changes::Change;
use crate::error::{ExportError, Result};
use crate::model::Document;
use log::debug;

/// Export a document.
///
/// `changes` is used only when `options.annotate` is set.
pub fn export(doc: &Document, changes: Option<&[Change]>, options: &ExportOptions) -> Result<Vec<u8>> {
    check_minimums(doc)?;
    let changes = if options.annotate { changes } else { None };

    let bytes = match options.format {
        ExportFormat::Json => json::to_json(doc, changes, options.pretty)?.into_bytes(),
        ExportFormat::Markdown => markdown::to_markdown(doc, changes).into_bytes(),
        ExportFormat::Text => text::to_text(doc, changes).into_bytes(),
        ExportFormat::Docx => docx::to_docx(doc)?,
        ExportFormat::Pdf => pdf::to_pdf(doc, changes)?,
    };
    debug!("Exported {} bytes as {}", bytes.len(), options.format);
    Ok(bytes)
}

/// Reject documents that no target format can represent.
fn check_minimums(doc: &Document) -> Result<()> {
    let has_title = doc
        .metadata
        .title
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        return Err(ExportError::SerializationFailure("document has no title".to_string()).into());
    }
    if doc.sections.is_empty() {
        return Err(ExportError::SerializationFailure("document has no sections".to_string()).into());
    }
    Ok(())
}

/// Plain-text change list appended to annotated renderings.
fn change_appendix(changes: &[Change]) -> Vec<String> {
    changes
        .iter()
        .map(|c| {
            let flag = if c.user_override { " (user override)" } else { "" };
            format!(
                "{}. [{}] {} at {}: {} -> {}{}",
                c.seq,
                c.rule_id,
                c.kind.name(),
                c.location,
                c.before,
                c.after,
                flag
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::model::{Block, Section, SectionId, SectionType};

    #[test]
    fn test_missing_title_fails() {
        let mut doc = Document::new();
        doc.push_section(Section::new(SectionId(0), SectionType::Introduction, None));
        let err = export(&doc, None, &ExportOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Export(ExportError::SerializationFailure(_))
        ));
    }

    #[test]
    fn test_no_sections_fails() {
        let doc = Document::with_title("Paper");
        for format in ExportFormat::ALL {
            assert!(export(&doc, None, &ExportOptions::new(format)).is_err());
        }
    }

    #[test]
    fn test_every_format_exports() {
        let mut doc = Document::with_title("Paper");
        let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("I. INTRODUCTION".into()));
        intro.add_block(Block::text("Hello."));
        doc.push_section(intro);
        for format in ExportFormat::ALL.into_iter().filter(|f| f.is_available()) {
            let bytes = export(&doc, None, &ExportOptions::new(format)).unwrap();
            assert!(!bytes.is_empty(), "{}", format);
        }
    }
}
