//! PDF rendering through Typst.
//!
//! The document is first written as Typst markup, which is always
//! available, then compiled to PDF when the `pdf` feature is enabled.
//! Every piece of manuscript text is emitted as a Typst string literal, so
//! markup characters in the text are never interpreted.

use super::change_appendix;
use crate::changes::Change;
use crate::error::{ExportError, Result};
use crate::model::{Block, BlockContent, Document, PageLayout, TextStyle};
use crate::ruleset::RuleSet;

/// Serif faces tried after a block's own font.
const FALLBACK_FONTS: [&str; 2] = ["Times New Roman", "Libertinus Serif"];

/// Render a document as PDF bytes.
#[cfg(feature = "pdf")]
pub(super) fn to_pdf(doc: &Document, changes: Option<&[Change]>) -> Result<Vec<u8>> {
    use log::warn;
    use typst_as_lib::{typst_kit_options::TypstKitFontOptions, TypstEngine};

    let source = to_typst(doc, changes);
    let engine = TypstEngine::builder()
        .main_file(source.as_str())
        .search_fonts_with(
            TypstKitFontOptions::default()
                .include_system_fonts(true)
                .include_embedded_fonts(true),
        )
        .build();

    let compiled = engine.compile();
    for warning in &compiled.warnings {
        warn!("Typst warning: {:?}", warning);
    }
    let document = compiled
        .output
        .map_err(|e| ExportError::SerializationFailure(format!("typst compilation: {:?}", e)))?;

    let bytes = typst_pdf::pdf(&document, &typst_pdf::PdfOptions::default())
        .map_err(|e| ExportError::SerializationFailure(format!("pdf encoding: {:?}", e)))?;
    Ok(bytes)
}

/// Render a document as PDF bytes.
#[cfg(not(feature = "pdf"))]
pub(super) fn to_pdf(_doc: &Document, _changes: Option<&[Change]>) -> Result<Vec<u8>> {
    Err(ExportError::FeatureRequired {
        format: "pdf".to_string(),
        feature: "pdf".to_string(),
    }
    .into())
}

/// Write a document as Typst markup, the source PDF export compiles.
///
/// The page follows the document's layout, or the IEEE conference layout
/// when the source carried none. The title block spans all columns.
pub fn to_typst(doc: &Document, changes: Option<&[Change]>) -> String {
    let layout = doc
        .metadata
        .layout
        .clone()
        .unwrap_or_else(|| RuleSet::ieee_conference().layout);
    let mut out = preamble(&layout);

    out.push_str("#place(top + center, float: true, scope: \"parent\", clearance: 1.5em)[\n");
    if let Some(title) = &doc.metadata.title {
        out.push_str(&format!(
            "  #text({})[{}]\n\n",
            style_args(&doc.metadata.title_style, Some(24.0)),
            literal(title)
        ));
    }
    if !doc.metadata.authors.is_empty() {
        out.push_str(&format!("  {}\n\n", literal(&doc.metadata.author_line())));
    }
    for affiliation in &doc.metadata.affiliations {
        out.push_str(&format!("  #text(style: \"italic\")[{}]\n\n", literal(affiliation)));
    }
    out.push_str("]\n\n");

    for section in &doc.sections {
        if let Some(heading) = &section.heading {
            out.push_str(&format!("= {}\n\n", literal(heading)));
        }
        for block in &section.blocks {
            render_block(&mut out, block);
        }
    }

    if let Some(changes) = changes.filter(|c| !c.is_empty()) {
        out.push_str(&format!("= {}\n\n", literal("Change Log")));
        for line in change_appendix(changes) {
            out.push_str(&format!("- {}\n", literal(&line)));
        }
    }
    out
}

fn preamble(layout: &PageLayout) -> String {
    let m = &layout.margins;
    format!(
        "#set page(paper: \"us-letter\", margin: (top: {}in, bottom: {}in, left: {}in, right: {}in), columns: {})\n\
         #set columns(gutter: {}in)\n\
         #set text(font: ({}), size: 10pt)\n\
         #set par(justify: true)\n\
         #set heading(numbering: none)\n\n",
        m.top,
        m.bottom,
        m.left,
        m.right,
        layout.columns.max(1),
        layout.column_gap,
        font_list(None),
    )
}

fn render_block(out: &mut String, block: &Block) {
    match &block.content {
        BlockContent::Text { text } => {
            let args = style_args(&block.text_style, None);
            if args.is_empty() {
                out.push_str(&literal(text));
            } else {
                out.push_str(&format!("#text({})[{}]", args, literal(text)));
            }
            out.push_str("\n\n");
        }
        BlockContent::Subheading { text } => {
            out.push_str(&format!("== {}\n\n", literal(text)));
        }
        BlockContent::Figure { caption, source } => {
            let placeholder = source.as_deref().map(literal).unwrap_or_default();
            out.push_str(&format!(
                "#align(center, rect(width: 90%, height: 6em, stroke: 0.5pt)[{}])\n\n",
                placeholder
            ));
            out.push_str(&format!("#align(center)[{}]\n\n", literal(caption)));
        }
        BlockContent::Table { caption, rows } => {
            if !caption.is_empty() {
                out.push_str(&format!("#align(center)[{}]\n\n", literal(caption)));
            }
            let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
            if width > 0 {
                let cells: Vec<String> = rows
                    .iter()
                    .flat_map(|row| {
                        (0..width).map(move |i| {
                            format!("[{}]", literal(row.get(i).map(String::as_str).unwrap_or("")))
                        })
                    })
                    .collect();
                out.push_str(&format!(
                    "#align(center, table(columns: {}, {}))\n\n",
                    width,
                    cells.join(", ")
                ));
            }
        }
        BlockContent::Equation { tex } => {
            out.push_str(&format!(
                "#align(center, raw({}, block: true))\n\n",
                quote(tex)
            ));
        }
    }
}

/// Arguments for `#text(...)` from a block's character style.
fn style_args(style: &TextStyle, default_size: Option<f32>) -> String {
    let mut args = Vec::new();
    if style.font_family.is_some() {
        args.push(format!("font: ({})", font_list(style.font_family.as_deref())));
    }
    if let Some(size) = style.font_size.or(default_size) {
        args.push(format!("size: {}pt", size));
    }
    if style.bold {
        args.push("weight: \"bold\"".to_string());
    }
    if style.italic {
        args.push("style: \"italic\"".to_string());
    }
    args.join(", ")
}

fn font_list(first: Option<&str>) -> String {
    let mut fonts: Vec<String> = first.map(quote).into_iter().collect();
    fonts.extend(
        FALLBACK_FONTS
            .iter()
            .filter(|f| Some(**f) != first)
            .map(|f| quote(f)),
    );
    format!("{},", fonts.join(", "))
}

/// Manuscript text as markup: a string literal in code mode.
fn literal(text: &str) -> String {
    format!("#{}", quote(text))
}

fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => {}
            '\t' => quoted.push_str("\\t"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::{ChangeKind, ChangeLog, PendingChanges, Snapshot};
    use crate::model::{Location, Margins, Section, SectionId, SectionType};

    fn sample() -> Document {
        let mut doc = Document::with_title("Typeset *Paper*");
        doc.metadata.authors = vec!["A. Author".into()];
        doc.metadata.affiliations = vec!["Some Lab".into()];
        let mut intro = Section::new(SectionId(0), SectionType::Introduction, Some("I. INTRODUCTION".into()));
        intro.add_block(Block::text("Costs #1 and $2 rose by 5% [1]."));
        intro.add_block(Block::subheading("A. Scope"));
        intro.add_block(Block::equation(r"E = \frac{m}{c}"));
        intro.add_block(Block::table(
            "TABLE I. Data",
            vec![vec!["a".into(), "b".into()], vec!["1".into()]],
        ));
        intro.add_block(Block::figure("Fig. 1. Loss", Some("loss.png".into())));
        doc.push_section(intro);
        doc
    }

    #[test]
    fn test_markup_characters_are_quoted() {
        let source = to_typst(&sample(), None);
        assert!(source.contains(r#"#text(size: 24pt)[#"Typeset *Paper*"]"#));
        assert!(source.contains(r#"#"Costs #1 and $2 rose by 5% [1]."#));
        assert!(source.contains(r#"raw("E = \\frac{m}{c}", block: true)"#));
        assert!(!source.contains("\n*"));
    }

    #[test]
    fn test_outline() {
        let source = to_typst(&sample(), None);
        let heading = source.find(r#"= #"I. INTRODUCTION""#).unwrap();
        let sub = source.find(r#"== #"A. Scope""#).unwrap();
        assert!(heading < sub);
        assert!(source.contains(r#"table(columns: 2, [#"a"], [#"b"], [#"1"], [#""])"#));
        assert!(source.contains(r#"#align(center)[#"Fig. 1. Loss"]"#));
    }

    #[test]
    fn test_layout_from_document() {
        let mut doc = sample();
        doc.metadata.layout = Some(PageLayout {
            margins: Margins {
                top: 1.0,
                bottom: 1.0,
                left: 0.5,
                right: 0.5,
            },
            columns: 1,
            column_gap: 0.25,
        });
        let source = to_typst(&doc, None);
        assert!(source.starts_with(
            "#set page(paper: \"us-letter\", margin: (top: 1in, bottom: 1in, left: 0.5in, right: 0.5in), columns: 1)"
        ));

        let default = to_typst(&sample(), None);
        assert!(default.contains("columns: 2)"));
    }

    #[test]
    fn test_block_styles() {
        let mut doc = sample();
        doc.sections[0].blocks[0].text_style = TextStyle::new("Helvetica", 9.0, true, false);
        let source = to_typst(&doc, None);
        assert!(source.contains(
            r#"#text(font: ("Helvetica", "Times New Roman", "Libertinus Serif",), size: 9pt, weight: "bold")"#
        ));
    }

    #[test]
    fn test_change_log_appendix() {
        let mut log = ChangeLog::new();
        let mut pending = PendingChanges::new("headings");
        pending.record(
            ChangeKind::HeadingRename,
            Location::Section {
                section: SectionId(0),
            },
            Snapshot::Text("Intro".into()),
            Snapshot::Text("I. INTRODUCTION".into()),
        );
        log.commit(pending);
        let source = to_typst(&sample(), Some(log.as_slice()));
        assert!(source.contains(r#"= #"Change Log""#));
        assert!(source.contains("- #\"1. [headings]"));
    }

    #[cfg(not(feature = "pdf"))]
    #[test]
    fn test_pdf_needs_feature() {
        let err = to_pdf(&sample(), None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Export(ExportError::FeatureRequired { .. })
        ));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_pdf_bytes() {
        let bytes = to_pdf(&sample(), None).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }
}
